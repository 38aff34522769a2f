//! # Example: respawn_crash
//!
//! Supervises a shell child that prints a line and fails after a short time.
//! The supervisor restarts it with a growing delay until the budget runs out.
//!
//! ## Flow
//! ```text
//! start()
//!   ├─► spawn   attempt=0
//!   ├─► stdout  "tick from <pid>"
//!   ├─► exit    code=1
//!   ├─► crash
//!   ├─► sleep   attempt=1 delay=100ms
//!   ├─► spawn   attempt=1
//!   │     ...
//!   ├─► crash   (budget of 3 restarts spent)
//!   └─► stop    → status "crashed"
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example respawn_crash
//! ```

use procvisor::{CommandSpec, Config, DelayPolicy, EventKind, RestartLimit, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Describe the child: print, wait a bit, fail
    let spec = CommandSpec::new("/bin/sh").args(["-c", "echo \"tick from $$\"; sleep 0.2; exit 1"]);

    // 2. At most 3 restarts, 100ms / 300ms / 900ms apart
    let cfg = Config {
        name: Some("ticker".into()),
        max_restarts: RestartLimit::Limited(3),
        sleep: DelayPolicy::sequence_ms([100, 300, 900]),
        ..Config::default()
    };

    let sup = Supervisor::builder(spec).config(cfg).inherit_env().build();
    let mut events = sup.subscribe();
    sup.start();

    // 3. Print the event stream until the episode ends
    while let Ok(ev) = events.recv().await {
        match ev.kind {
            EventKind::Spawn => println!("[spawn] pid={:?} attempt={:?}", ev.pid, ev.attempt),
            EventKind::Stdout => {
                if let Some(data) = &ev.data {
                    print!("[stdout] {}", String::from_utf8_lossy(data));
                }
            }
            EventKind::Exit => println!("[exit] code={:?} signal={:?}", ev.code, ev.signal),
            EventKind::Sleep => println!("[sleep] attempt={:?} delay={:?}", ev.attempt, ev.delay()),
            EventKind::Stop => {
                println!("[stop]");
                break;
            }
            other => println!("[{}]", other.as_label()),
        }
    }

    println!("final status: {}", sup.status());
    println!("{}", serde_json::to_string_pretty(&sup.info())?);
    Ok(())
}
