use crate::config::NodeConfig;
use crate::peers::{FilePeerProtocol, NoPeersProtocol};
use agora_dataset::{DatasetLayout, WorkLayout};
use agora_engine::{DailyScheduler, LogWeightSink, Orchestrator, Worker};
use agora_sandbox::DockerSandbox;
use agora_store::{JobQueue, MemoryBackend, StoreBackend, TournamentStore};
use agora_submission::{GitDockerBuilder, SubmissionProcessor, SubmissionProtocol};
use anyhow::{bail, Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wires the engine together and runs it until shutdown.
pub struct AgoraNode {
    config: NodeConfig,
    orchestrator: Arc<Orchestrator>,
}

impl AgoraNode {
    pub fn build(config: NodeConfig) -> Result<Self> {
        let backend = open_backend(&config)?;
        let store = TournamentStore::new(backend.clone());
        let queue = JobQueue::new(backend);

        let protocol: Arc<dyn SubmissionProtocol> = match &config.node.peers_file {
            Some(path) => {
                info!(path = %path.display(), "using file-backed peer protocol");
                Arc::new(FilePeerProtocol::new(path))
            }
            None => {
                warn!("no peer adapter configured, collection will find no peers");
                Arc::new(NoPeersProtocol)
            }
        };

        let builder = GitDockerBuilder::new(config.node.work_root.join("builds"))
            .with_build_timeout(Duration::from_secs(config.node.build_timeout_seconds));
        let processor = Arc::new(SubmissionProcessor::new(protocol, Arc::new(builder)));

        let orchestrator = Arc::new(
            Orchestrator::new(
                store,
                queue,
                processor,
                Arc::new(DockerSandbox::new(config.node.docker_bin.clone())),
                DatasetLayout::new(config.node.data_root.clone()),
                WorkLayout::new(config.node.work_root.join("runs")),
                Arc::new(LogWeightSink),
                config.tournament.clone(),
            )
            .with_collect_poll(config.node.collect_poll_seconds),
        );

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// Run worker, scheduler, and admin API until SIGINT.
    pub async fn run(self) -> Result<()> {
        let shutdown = self.orchestrator.shutdown_handle();

        let worker = Worker::new(self.orchestrator.clone());
        let worker_task = tokio::spawn(async move { worker.run().await });

        let scheduler = DailyScheduler::new(
            self.orchestrator.clone(),
            self.config.tournament.schedule_mode,
        );
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let api_task = if self.config.api.enabled {
            let router = crate::api::router(self.orchestrator.clone());
            let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding admin api to {addr}"))?;
            info!(addr = %addr, "📡 admin api listening");
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!(error = %e, "admin api exited");
                }
            }))
        } else {
            None
        };

        tokio::signal::ctrl_c()
            .await
            .context("waiting for shutdown signal")?;
        info!("🛑 shutdown signal received");
        shutdown.store(true, Ordering::Relaxed);

        let _ = worker_task.await;
        scheduler_task.abort();
        if let Some(api) = api_task {
            api.abort();
        }
        info!("node stopped");
        Ok(())
    }
}

fn open_backend(config: &NodeConfig) -> Result<Arc<dyn StoreBackend>> {
    match config.node.store_backend.as_str() {
        "memory" => {
            warn!("memory store selected: state will not survive a restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        "rocksdb" => {
            #[cfg(feature = "rocksdb")]
            {
                let backend = agora_store::RocksBackend::new(&config.node.store_path)
                    .context("opening rocksdb store")?;
                Ok(Arc::new(backend))
            }
            #[cfg(not(feature = "rocksdb"))]
            {
                bail!("store_backend = rocksdb, but the binary was built without the rocksdb feature")
            }
        }
        other => bail!("unknown store backend '{other}'"),
    }
}
