#[cfg(not(feature = "sim"))]
fn main() {
    eprintln!("the demo loop requires the `sim` feature (enabled by default)");
}

#[cfg(feature = "sim")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use chrono::Local;
    use energy_flow_viz::sim::{DashboardGeometry, HeadlessRenderer, SimulatedSensors};
    use energy_flow_viz::{telemetry, Config, FlowEngine};
    use std::time::Instant;
    use tracing::{info, warn};

    telemetry::init_tracing();

    let cfg = Config::load()?;
    let mut engine = FlowEngine::new(cfg.maxima.clone());
    engine.set_reduced_motion(cfg.engine.reduced_motion);

    let geometry = DashboardGeometry::default();
    let mut renderer = HeadlessRenderer::default();
    let mut sensors = SimulatedSensors::default();

    info!(
        tick_ms = cfg.engine.tick_ms,
        update_interval_ms = cfg.engine.update_interval_ms,
        "starting energy flow visualization demo"
    );

    let start = Instant::now();
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(cfg.engine.tick_ms));
    let mut last_update_ms: u64 = 0;
    let mut last_diag_ms: u64 = 0;

    let shutdown = telemetry::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let now_ms = start.elapsed().as_millis() as u64;

                for handle in renderer.drain_completed(now_ms) {
                    engine.on_transition_complete(handle, &mut renderer);
                }
                engine.tick(&mut renderer, now_ms);

                if now_ms.saturating_sub(last_update_ms) >= cfg.engine.update_interval_ms {
                    last_update_ms = now_ms;
                    let snapshot = sensors.sample(Local::now());
                    engine.animate_flow(snapshot, &geometry, &mut renderer, now_ms);
                }

                if now_ms.saturating_sub(last_diag_ms) >= 5000 {
                    last_diag_ms = now_ms;
                    let diag = engine.diagnostics();
                    info!(diagnostics = %serde_json::to_string(&diag)?, "engine status");
                }
            }
        }
    }

    engine.stop_all(&mut renderer);
    warn!("shutdown complete");
    Ok(())
}
