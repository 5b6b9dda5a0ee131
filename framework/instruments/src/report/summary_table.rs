use tabled::Tabled;

#[derive(Tabled)]
pub struct GroupRow {
    pub group: String,
    #[tabled(display = "float2")]
    pub avg_ms: f64,
    #[tabled(display = "float2")]
    pub min_ms: f64,
    #[tabled(display = "float2")]
    pub med_ms: f64,
    #[tabled(display = "float2")]
    pub p90_ms: f64,
    #[tabled(display = "float2")]
    pub p95_ms: f64,
    #[tabled(display = "float2")]
    pub max_ms: f64,
    pub requests: usize,
    #[tabled(display = "percent")]
    pub failed: f64,
    pub timeouts: usize,
}

#[derive(Tabled)]
pub struct ThresholdRow {
    pub metric: String,
    pub threshold: String,
    pub observed: String,
    pub result: &'static str,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn percent(n: &f64) -> String {
    format!("{:.2}%", n * 100.0)
}
