use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::OnceLock;

// It's important to use the exported crate `prometheus_exporter::prometheus`
// instead of `prometheus`, as different versions of that crate have
// incompatible global registries.
use prometheus_exporter::prometheus;

pub struct PrometheusMetrics {
    pub index_node_requests: prometheus::IntCounterVec,
    pub epoch_oracle_requests: prometheus::IntCounterVec,
    pub poi_report_uploads: prometheus::IntCounterVec,
    pub poi_report_records: prometheus::IntGauge,
}

static METRICS: OnceLock<PrometheusMetrics> = OnceLock::new();

pub fn metrics() -> &'static PrometheusMetrics {
    METRICS.get_or_init(|| PrometheusMetrics::new(prometheus::default_registry().clone()))
}

impl PrometheusMetrics {
    fn new(registry: prometheus::Registry) -> Self {
        // Registration only fails on duplicate or malformed metric names,
        // which are all static here.
        let index_node_requests = prometheus::register_int_counter_vec_with_registry!(
            "index_node_requests",
            "Number of GraphQL requests sent to the index node",
            &["query", "success"],
            registry
        )
        .unwrap();
        let epoch_oracle_requests = prometheus::register_int_counter_vec_with_registry!(
            "epoch_oracle_requests",
            "Number of requests sent to the epoch block oracle",
            &["success"],
            registry
        )
        .unwrap();
        let poi_report_uploads = prometheus::register_int_counter_vec_with_registry!(
            "poi_report_uploads",
            "Number of PoI report uploads to the POIfier server",
            &["success"],
            registry
        )
        .unwrap();
        let poi_report_records = prometheus::register_int_gauge_with_registry!(
            "poi_report_records",
            "Number of records in the most recently built PoI report",
            registry
        )
        .unwrap();

        Self {
            index_node_requests,
            epoch_oracle_requests,
            poi_report_uploads,
            poi_report_records,
        }
    }
}

#[derive(Debug)]
pub struct PrometheusExporter {
    binding: SocketAddr,
    _exporter: prometheus_exporter::Exporter,
}

impl PrometheusExporter {
    /// Starts exporting Prometheus metrics at `http://0.0.0.0:{port}/metrics`. The server
    /// will keep running until the returned [`PrometheusExporter`] is dropped.
    pub fn start(port: u16, registry: prometheus::Registry) -> anyhow::Result<Self> {
        let binding = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let exporter = {
            let mut builder = prometheus_exporter::Builder::new(binding);
            builder.with_registry(registry);
            builder.start()?
        };

        Ok(Self {
            binding,
            _exporter: exporter,
        })
    }

    /// Returns the port this Prometheus exporter is bound to.
    pub fn port(&self) -> u16 {
        self.binding.port()
    }
}
