//! # Example: headless
//!
//! Drives a [`Runtime`] against an in-memory page and plays the part of the
//! host application: the loading wheel spins, a virtual page opens, the
//! counter changes.
//!
//! ## Flow
//! ```text
//! Runtime::start()
//!   ├─► load pass: frame (CONTAINER) ─► counter_badge (INTERFACE_ENHANCEMENT)
//!   ├─► login panel found ─► ObserverManager::start()
//!   └─► host simulation:
//!         loading wheel hidden ─► ViewReloaded
//!         #news opened          ─► ViewReloaded
//!         counter text changed  ─► CounterChanged
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=pagevisor=debug,headless=info cargo run --example headless
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagevisor::{
    Catalog, Config, Element, EventKind, LogWriter, MemoryPage, ModuleFn, ModuleSpec,
    NetworkBridge, Request, Response, Runtime, Subscribe, TransportError,
};

/// Bridge with no network behind it.
struct Offline;

#[async_trait]
impl NetworkBridge for Offline {
    async fn request(&self, request: Request) -> Result<Response, TransportError> {
        Err(TransportError::Failed {
            method: request.method.to_string(),
            path: request.path,
            reason: String::from("offline demo"),
        })
    }
}

fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pagevisor=info,headless=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let page = Arc::new(
        MemoryPage::new()
            .with_hostname("www.die2nite.com")
            .with_fragment("#city/enter?go=city/bank;sk=ab12c"),
    );
    page.append_to_body(Element::new("div").with_id("tid_sidePanel_user"));
    page.append_to_body(Element::new("div").with_id("clock"));
    let wheel = page.append_to_body(
        Element::new("div")
            .with_id("loading_section")
            .with_style("display", "block"),
    );
    let counter = page.append_to_body(Element::new("span").with_id("movesCounter"));

    let catalog = Arc::new(Catalog::new("en").with("en", "badge", "Moves"));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let frame = ModuleSpec::new(ModuleFn::arc("frame", |_| Ok(())), "CONTAINER");
    let badge = ModuleSpec::new(
        ModuleFn::arc("counter_badge", |ctx| {
            let loads = ctx.property("/loads").and_then(|v| v.as_u64()).unwrap_or(0);
            ctx.set_property("/loads", json!(loads + 1));
            ctx.save_properties()?;
            Ok(())
        }),
        "INTERFACE_ENHANCEMENT",
    )
    .with_properties(json!({ "loads": 0 }));

    let runtime = Runtime::builder(Config::default())
        .with_page(page.clone())
        .with_bridge(Arc::new(Offline))
        .with_translator(catalog)
        .with_subscribers(subs)
        .with_modules(vec![frame, badge])
        .build()?;

    let bus = runtime.bus().clone();
    bus.on(EventKind::CounterChanged, |_| info!("badge refresh"));
    bus.on(EventKind::ViewReloaded, |ev| {
        info!(seq = ev.seq, "view reloaded; overlays redrawn");
    });

    let report = runtime.start().await?;
    info!(
        loaded = report.load.loaded.len(),
        logged_in = report.logged_in,
        language = report.language.as_deref().unwrap_or("?"),
        "runtime started"
    );

    // let the observers settle
    tokio::time::sleep(Duration::from_millis(500)).await;

    page.set_style(wheel, "display", "none")?;
    page.navigate("#news");
    page.set_text(counter, "7")?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    runtime.shutdown().await;
    Ok(())
}
