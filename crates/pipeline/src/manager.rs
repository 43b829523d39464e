//! Per-probe workers feeding the shared span controller.
//!
//! Each enabled probe gets one worker task and one bounded channel, so
//! events from the same probe are converted in the order they were captured.
//! Workers for different probes run concurrently and share the controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use autotrace_core::config::Config;
use autotrace_core::{AutotraceError, Result};
use autotrace_probes::layout::{Layout, select_layout};
use autotrace_probes::probe::{self, ProbeId};
use autotrace_probes::{CapturedEvent, ConvertContext};
use semver::Version;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::SpanController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProbeEntry {
    layout: Layout,
    enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub converted: u64,
    pub spans: u64,
    pub dropped: u64,
}

pub struct Manager {
    controller: Arc<SpanController>,
    ctx: Arc<ConvertContext>,
    cfg: Config,
    probes: BTreeMap<String, (ProbeId, ProbeEntry)>,
    senders: BTreeMap<String, mpsc::Sender<CapturedEvent>>,
    workers: Vec<(ProbeId, JoinHandle<WorkerStats>)>,
    stop: watch::Sender<bool>,
    running: bool,
    shut_down: bool,
}

impl Manager {
    pub fn new(cfg: &Config, controller: Arc<SpanController>) -> Self {
        let ctx = ConvertContext::new(controller.clock(), cfg);
        let (stop, _) = watch::channel(false);
        Self {
            controller,
            ctx: Arc::new(ctx),
            cfg: cfg.clone(),
            probes: BTreeMap::new(),
            senders: BTreeMap::new(),
            workers: Vec::new(),
            stop,
            running: false,
            shut_down: false,
        }
    }

    /// Registers `probe` with the record layout it captures. Probes whose
    /// package is listed in `disabled_probes` start out disabled.
    pub fn register(&mut self, probe: ProbeId, layout: Layout) -> Result<()> {
        self.ensure_idle("register")?;
        let key = probe.to_string();
        if self.probes.contains_key(&key) {
            return Err(AutotraceError::Probe(format!("{probe} is already registered")));
        }

        let enabled = !self.cfg.is_probe_disabled(probe.package);
        if !enabled {
            info!(probe = %probe, "probe disabled by configuration");
        }
        self.probes.insert(key, (probe, ProbeEntry { layout, enabled }));
        Ok(())
    }

    /// Registers every known probe, picking layouts for the instrumented
    /// runtime `version`.
    pub fn register_all(&mut self, version: &Version) -> Result<()> {
        for probe in probe::ALL {
            let layout = select_layout(probe, version)?;
            self.register(probe, layout)?;
        }
        Ok(())
    }

    pub fn enable(&mut self, probe: ProbeId) -> Result<()> {
        self.set_enabled(probe, true)
    }

    pub fn disable(&mut self, probe: ProbeId) -> Result<()> {
        self.set_enabled(probe, false)
    }

    fn set_enabled(&mut self, probe: ProbeId, enabled: bool) -> Result<()> {
        self.ensure_idle(if enabled { "enable" } else { "disable" })?;
        let (_, entry) = self
            .probes
            .get_mut(&probe.to_string())
            .ok_or_else(|| AutotraceError::Probe(format!("{probe} is not registered")))?;
        entry.enabled = enabled;
        Ok(())
    }

    fn ensure_idle(&self, op: &str) -> Result<()> {
        if self.running || self.shut_down {
            return Err(AutotraceError::InvalidArgument(format!(
                "cannot {op} probes once the manager has started"
            )));
        }
        Ok(())
    }

    pub fn is_enabled(&self, probe: ProbeId) -> bool {
        self.probes
            .get(&probe.to_string())
            .is_some_and(|(_, entry)| entry.enabled)
    }

    pub fn layout(&self, probe: ProbeId) -> Option<Layout> {
        self.probes
            .get(&probe.to_string())
            .map(|(_, entry)| entry.layout)
    }

    /// Spawns one worker per enabled probe. Must be called from within a
    /// tokio runtime.
    pub fn run(&mut self) -> Result<()> {
        self.ensure_idle("run")?;
        self.running = true;

        for (key, (probe, entry)) in &self.probes {
            if !entry.enabled {
                continue;
            }

            let (tx, rx) = mpsc::channel(self.cfg.event_channel_capacity.max(1));
            let worker = run_worker(
                *probe,
                rx,
                self.stop.subscribe(),
                Arc::clone(&self.ctx),
                Arc::clone(&self.controller),
            );
            self.workers.push((*probe, tokio::spawn(worker)));
            self.senders.insert(key.clone(), tx);
            debug!(probe = %probe, layout = ?entry.layout, "started probe worker");
        }

        info!(workers = self.workers.len(), "manager running");
        Ok(())
    }

    /// Ingress handle for `probe`, or `None` when it is not running.
    pub fn sender(&self, probe: ProbeId) -> Option<mpsc::Sender<CapturedEvent>> {
        self.senders.get(&probe.to_string()).cloned()
    }

    /// Decodes a raw record with the probe's registered layout and queues it.
    /// Undecodable records are logged and dropped. Returns whether the event
    /// was queued.
    pub async fn submit_record(&self, probe: ProbeId, raw: &[u8]) -> bool {
        let (Some(layout), Some(tx)) = (self.layout(probe), self.sender(probe)) else {
            debug!(probe = %probe, "probe not running; dropping record");
            return false;
        };

        let event = match CapturedEvent::decode(probe, layout, raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(probe = %probe, error = %err, "dropping unreadable record");
                return false;
            }
        };

        if tx.send(event).await.is_err() {
            warn!(probe = %probe, "event channel closed; dropping record");
            return false;
        }
        true
    }

    /// Stops ingress, lets workers drain what was already queued, then
    /// flushes and shuts the exporter down. Later calls return `Ok(())`.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.running = false;

        self.senders.clear();
        let _ = self.stop.send(true);

        let mut errors = Vec::new();
        for (probe, handle) in self.workers.drain(..) {
            match handle.await {
                Ok(stats) => info!(
                    probe = %probe,
                    converted = stats.converted,
                    spans = stats.spans,
                    dropped = stats.dropped,
                    "probe worker stopped"
                ),
                Err(err) => errors.push(format!("{probe} worker failed: {err}")),
            }
        }

        if let Err(err) = self.controller.shutdown() {
            errors.push(err.to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AutotraceError::Export(errors.join("; ")))
        }
    }
}

async fn run_worker(
    probe: ProbeId,
    mut rx: mpsc::Receiver<CapturedEvent>,
    mut stop: watch::Receiver<bool>,
    ctx: Arc<ConvertContext>,
    controller: Arc<SpanController>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                rx.close();
                break;
            }
            event = rx.recv() => match event {
                Some(event) => handle_event(probe, event, &ctx, &controller, &mut stats),
                None => return stats,
            },
        }
    }

    // Ingress is closed; finish whatever was already queued.
    while let Some(event) = rx.recv().await {
        handle_event(probe, event, &ctx, &controller, &mut stats);
    }
    stats
}

fn handle_event(
    probe: ProbeId,
    event: CapturedEvent,
    ctx: &ConvertContext,
    controller: &SpanController,
    stats: &mut WorkerStats,
) {
    if event.probe() != probe {
        warn!(probe = %probe, got = %event.probe(), "dropping event captured by another probe");
        stats.dropped += 1;
        return;
    }

    let spans = event.convert(ctx);
    stats.converted += 1;
    stats.spans += spans.len() as u64;
    controller.trace(spans);
}

#[cfg(test)]
mod tests {
    use autotrace_probes::Record;
    use opentelemetry::trace::{SpanId, Status};
    use opentelemetry_sdk::trace::SdkTracerProvider;

    use super::*;

    fn manager(cfg: &Config) -> (Manager, testkit::RecordingExporter) {
        let (provider, exporter) = testkit::recording_provider();
        (with_provider(cfg, provider), exporter)
    }

    fn with_provider(cfg: &Config, provider: SdkTracerProvider) -> Manager {
        let controller = Arc::new(SpanController::with_clock(provider, testkit::fixed_clock()));
        Manager::new(cfg, controller)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (mut manager, _) = manager(&Config::default());
        manager.register(probe::HTTP_CLIENT, Layout::Standard).unwrap();
        assert!(manager.register(probe::HTTP_CLIENT, Layout::Standard).is_err());
        manager.register(probe::HTTP_SERVER, Layout::HttpServerLegacy).unwrap();
    }

    #[test]
    fn configuration_disables_packages() {
        let cfg = Config {
            disabled_probes: vec!["github.com/segmentio/kafka-go".to_string()],
            ..Config::default()
        };
        let (mut manager, _) = manager(&cfg);
        manager.register_all(&Version::new(1, 22, 1)).unwrap();

        assert!(!manager.is_enabled(probe::KAFKA_PRODUCER));
        assert!(!manager.is_enabled(probe::KAFKA_CONSUMER));
        assert!(manager.is_enabled(probe::GO_REDIS));
        assert_eq!(manager.layout(probe::HTTP_SERVER), Some(Layout::HttpServerPattern));

        manager.enable(probe::KAFKA_CONSUMER).unwrap();
        manager.disable(probe::GO_REDIS).unwrap();
        assert!(manager.is_enabled(probe::KAFKA_CONSUMER));
        assert!(!manager.is_enabled(probe::GO_REDIS));
    }

    #[test]
    fn unknown_probe_cannot_be_toggled() {
        let (mut manager, _) = manager(&Config::default());
        assert!(manager.enable(probe::RUEIDIS).is_err());
    }

    #[tokio::test]
    async fn converts_and_exports_in_order() {
        let (mut manager, exporter) = manager(&Config::default());
        manager.register(probe::HTTP_CLIENT, Layout::Standard).unwrap();
        manager.run().unwrap();

        let tx = manager.sender(probe::HTTP_CLIENT).unwrap();
        for (span, status) in [(1u8, 200u64), (2, 500), (3, 204)] {
            let event = testkit::http_client_event(span, status);
            tx.send(CapturedEvent::HttpClient(event)).await.unwrap();
        }
        drop(tx);
        manager.shutdown().await.unwrap();

        let spans = exporter.finished_spans();
        let ids: Vec<_> = spans.iter().map(|s| s.span_context.span_id()).collect();
        assert_eq!(
            ids,
            vec![
                SpanId::from_bytes([1; 8]),
                SpanId::from_bytes([2; 8]),
                SpanId::from_bytes([3; 8]),
            ]
        );
        assert!(matches!(spans[1].status, Status::Error { .. }));
        assert_eq!(spans[0].status, Status::Unset);
    }

    #[tokio::test]
    async fn producer_batch_becomes_one_span_per_message() {
        let (mut manager, exporter) = manager(&Config::default());
        manager.register(probe::KAFKA_PRODUCER, Layout::Standard).unwrap();
        manager.run().unwrap();

        let batch = testkit::kafka_batch("orders", &["a", "b", "c"]);
        manager
            .sender(probe::KAFKA_PRODUCER)
            .unwrap()
            .send(CapturedEvent::KafkaProducer(Box::new(batch)))
            .await
            .unwrap();
        manager.shutdown().await.unwrap();

        let spans = exporter.finished_spans();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.parent_span_id == SpanId::from_bytes([0x01; 8])));
    }

    #[tokio::test]
    async fn raw_records_are_decoded() -> anyhow::Result<()> {
        let (mut manager, exporter) = manager(&Config::default());
        manager.register(probe::HTTP_CLIENT, Layout::Standard)?;
        manager.run()?;

        let raw = testkit::http_client_event(4, 200).to_bytes();
        assert!(manager.submit_record(probe::HTTP_CLIENT, &raw).await);
        assert!(!manager.submit_record(probe::HTTP_CLIENT, &raw[..32]).await);
        assert!(!manager.submit_record(probe::RUEIDIS, &raw).await);
        manager.shutdown().await?;

        assert_eq!(exporter.finished_spans().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_events_are_dropped() {
        let (mut manager, exporter) = manager(&Config::default());
        manager.register(probe::GO_REDIS, Layout::Standard).unwrap();
        manager.run().unwrap();

        let tx = manager.sender(probe::GO_REDIS).unwrap();
        tx.send(CapturedEvent::HttpClient(testkit::http_client_event(1, 200)))
            .await
            .unwrap();
        tx.send(CapturedEvent::GoRedis(testkit::go_redis_event(
            2,
            "*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n",
            2,
        )))
        .await
        .unwrap();
        manager.shutdown().await.unwrap();

        let spans = exporter.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "DB");
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_closes_ingress() {
        let (mut manager, _) = manager(&Config::default());
        manager.register(probe::DATABASE_SQL, Layout::Standard).unwrap();
        manager.run().unwrap();
        let tx = manager.sender(probe::DATABASE_SQL).unwrap();

        manager.shutdown().await.unwrap();
        manager.shutdown().await.unwrap();

        assert!(manager.sender(probe::DATABASE_SQL).is_none());
        assert!(tx.is_closed());
        assert!(manager.run().is_err());
        assert!(manager.register(probe::RUEIDIS, Layout::Standard).is_err());
    }

    #[tokio::test]
    async fn failed_export_shutdown_is_reported_once() {
        let (provider, exporter) = testkit::failing_provider();
        let mut manager = with_provider(&Config::default(), provider);
        manager.register(probe::HTTP_CLIENT, Layout::Standard).unwrap();
        manager.run().unwrap();

        let event = testkit::http_client_event(6, 200);
        assert!(manager.submit_record(probe::HTTP_CLIENT, &event.to_bytes()).await);

        let err = manager.shutdown().await.unwrap_err();
        assert!(matches!(err, AutotraceError::Export(_)));
        // Queued work was converted before the exporter was shut down.
        assert_eq!(exporter.finished_spans().len(), 1);
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn manual_spans_share_tracers_by_name() {
        let (mut manager, exporter) = manager(&Config::default());
        let controller = Arc::clone(&manager.controller);
        manager.register(probe::OTEL_GLOBAL, Layout::Standard).unwrap();
        manager.run().unwrap();

        let tx = manager.sender(probe::OTEL_GLOBAL).unwrap();
        for (span, tracer) in [(1u8, "jobs/worker"), (2, "jobs/worker"), (3, "billing")] {
            let event = testkit::manual_span_event(span, tracer, "process");
            tx.send(CapturedEvent::ManualSpan(Box::new(event))).await.unwrap();
        }
        drop(tx);
        manager.shutdown().await.unwrap();

        assert_eq!(controller.tracer_count(), 2);
        let spans = exporter.finished_spans();
        let scopes: Vec<_> = spans.iter().map(|s| s.instrumentation_scope.name()).collect();
        assert_eq!(scopes, vec!["jobs/worker", "jobs/worker", "billing"]);
        assert_eq!(spans[0].instrumentation_scope.version(), Some("v1.4.0"));
    }

    #[tokio::test]
    async fn disabled_probes_get_no_worker() {
        let (mut manager, _) = manager(&Config::default());
        manager.register(probe::GRPC_SERVER, Layout::Standard).unwrap();
        manager.disable(probe::GRPC_SERVER).unwrap();
        manager.run().unwrap();
        assert!(manager.sender(probe::GRPC_SERVER).is_none());
        manager.shutdown().await.unwrap();
    }
}
