//! # Example: custom_subscriber
//!
//! Wires the built-in [`LogWriter`] together with a custom subscriber that
//! answers the child over the fork-mode channel and stops the supervisor once
//! the child says it is done.
//!
//! The child speaks newline-delimited JSON on fd 3:
//! ```text
//! child  → {"hello":"world"}
//! parent → {"ack":true}
//! child  → {"done":true}      → subscriber calls stop()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example custom_subscriber --features logging
//! ```

use std::sync::{Arc, OnceLock, Weak};

use procvisor::{CommandSpec, Config, Event, EventKind, LogWriter, Subscribe, Supervisor};
use serde_json::json;

const CHILD: &str = r#"
echo '{"hello":"world"}' >&3
read -r reply <&3
echo "{\"done\":true,\"reply\":$reply}" >&3
exec sleep 30
"#;

/// Replies to greetings and stops the supervisor when the child is done.
struct Conversation {
    sup: OnceLock<Weak<Supervisor>>,
}

#[async_trait::async_trait]
impl Subscribe for Conversation {
    async fn on_event(&self, ev: &Event) {
        if ev.kind != EventKind::Message {
            return;
        }
        let (Some(msg), Some(sup)) = (&ev.message, self.sup.get().and_then(Weak::upgrade)) else {
            return;
        };
        if msg.get("hello").is_some() {
            if let Err(e) = sup.send(&json!({"ack": true})) {
                eprintln!("reply failed: {}", e.as_message());
            }
        } else if msg.get("done").is_some() {
            sup.stop();
        }
    }

    fn name(&self) -> &'static str {
        "conversation"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let conversation = Arc::new(Conversation {
        sup: OnceLock::new(),
    });
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), conversation.clone()];

    let sup = Supervisor::builder(CommandSpec::new("/bin/sh").args(["-c", CHILD]).fork(true))
        .config(Config {
            name: Some("chatty".into()),
            ..Config::default()
        })
        .inherit_env()
        .with_subscribers(subs)
        .build();
    let _ = conversation.sup.set(Arc::downgrade(&sup));

    let mut events = sup.subscribe();
    sup.start();
    while let Ok(ev) = events.recv().await {
        if ev.kind == EventKind::Stop {
            break;
        }
    }
    println!("final status: {}", sup.status());
}
