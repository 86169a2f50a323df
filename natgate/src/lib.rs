pub mod app;
pub mod common;
pub mod config;
pub mod handler;
pub mod nat;
pub mod net_wrapper;

use crate::app::capture::{self, FrameSource, LiveCapture};
use crate::app::dispatcher::{self, EgressReceiver};
use crate::app::inbound_manager::InboundManager;
use crate::config::Config;
use crate::prelude::*;

use anyhow::Context;
use std::time::Duration;

/// Starts the egress task, the capture thread and both listeners. Returns once
/// everything is running; setup failures are returned and meant to be fatal.
pub async fn run(ctx: AppContextRef, egress: EgressReceiver) -> Result<()> {
  tokio::spawn(dispatcher::run_egress(egress, ctx.clone()));

  if ctx.config.capture.enabled {
    let source = LiveCapture::open(&ctx.config.capture)
      .with_context(|| format!("Failed to capture on {}", ctx.config.capture.interface))?;
    info!(
      "Capturing on {} ({} link)",
      ctx.config.capture.interface,
      source.link_kind()
    );

    let ctx_capture = ctx.clone();
    std::thread::Builder::new()
      .name("capture".into())
      .spawn(move || match capture::run_capture(source, ctx_capture) {
        Ok(_) => info!("Capture exited"),
        Err(err) => error!("Capture failed: {:#}", err),
      })?;
  } else {
    info!("Capture disabled");
  }

  InboundManager::new(&ctx.config)
    .start(ctx.clone())
    .await
    .with_context(|| "Failed to start listeners")?;

  let secs = ctx.config.metrics_interval.0;
  if secs > 0 {
    let ctx1 = ctx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(Duration::from_secs(secs));
      loop {
        interval.tick().await;
        info!("{:?}", ctx1.metrics);
      }
    });
  }
  Ok(())
}

pub async fn run_bin(config_path: Option<&str>) -> Result<()> {
  let config = match config_path {
    Some(path) => config::load_file(path)
      .await
      .with_context(|| format!("Failed to read config file {}", path))?,
    None => Config::default(),
  };
  debug!("{:#?}", config);

  let (ctx, egress) = AppContext::new(&config);
  drop(config);

  run(Arc::new(ctx), egress).await?;
  Ok(())
}

pub mod prelude {
  pub use crate::common::*;
  pub use anyhow::Result;
  pub use async_trait::async_trait;
  pub use bytes::*;
  pub use log::*;
  pub use smol_str::SmolStr;
  pub use std::sync::Arc;
}
