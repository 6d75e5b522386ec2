use std::sync::Arc;

use reelbot_core::{
    config::Config,
    download::Orchestrator,
    probe::MediaProbe,
    telemetry::{NoopTelemetry, TelemetryQueue, TelemetrySink},
};
use reelbot_sheets::{SheetsSettings, SheetsTelemetry};
use reelbot_ytdlp::{FfprobeProbe, YtDlpTool};

#[tokio::main]
async fn main() -> Result<(), reelbot_core::Error> {
    reelbot_core::logging::init("reelbot")?;

    let cfg = Arc::new(Config::load()?);

    let sink: Arc<dyn TelemetrySink> = match SheetsSettings::from_config(&cfg) {
        Some(settings) => {
            let spreadsheet = settings.spreadsheet_id.clone();
            match SheetsTelemetry::new(settings) {
                Ok(sheets) => {
                    tracing::info!(%spreadsheet, "usage telemetry goes to Google Sheets");
                    Arc::new(sheets)
                }
                Err(e) => {
                    tracing::warn!("Google Sheets setup failed, usage telemetry is disabled: {e}");
                    Arc::new(NoopTelemetry)
                }
            }
        }
        None => {
            tracing::warn!("Google Sheets is not configured, usage telemetry is disabled");
            Arc::new(NoopTelemetry)
        }
    };
    let telemetry = Arc::new(TelemetryQueue::start(sink, cfg.telemetry_queue_capacity));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(YtDlpTool::new(cfg.ytdlp_path.clone())),
        cfg.retry_policy(),
        cfg.temp_dir.clone(),
        cfg.proxy_url.clone(),
    ));
    let probe: Arc<dyn MediaProbe> = Arc::new(FfprobeProbe::new(
        cfg.ffprobe_path.clone(),
        cfg.probe_timeout,
    ));

    let res = reelbot_telegram::router::run_polling(cfg, orchestrator, probe, telemetry.clone())
        .await
        .map_err(|e| reelbot_core::Error::External(format!("telegram bot failed: {e}")));

    telemetry.shutdown().await;
    res
}
