mod common;

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use common::*;
use procvisor::{
    CommandSpec, Config, DelayPolicy, Event, EventKind, RestartLimit, Signal, Status, Subscribe,
    Supervisor,
};

#[tokio::test]
async fn restarts_are_bounded() {
    let sup = build(
        sh("exit 1"),
        config(RestartLimit::Limited(3), DelayPolicy::constant_ms(0)),
    );
    let mut rx = sup.subscribe();
    sup.start();

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(count(&events, EventKind::Spawn), 4);
    assert_eq!(count(&events, EventKind::Exit), 4);
    assert_eq!(count(&events, EventKind::Crash), 4);
    assert_eq!(count(&events, EventKind::Sleep), 3);
    assert_eq!(count(&events, EventKind::Stop), 1);
    assert_eq!(sup.status(), Status::Crashed);
    assert_eq!(sup.restarts(), 3);

    let attempts: Vec<u32> = events
        .iter()
        .filter(|e| e.kind == EventKind::Spawn)
        .filter_map(|e| e.attempt)
        .collect();
    assert_eq!(attempts, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn crash_episode_is_ordered() {
    let sup = build(
        sh("exit 2"),
        config(RestartLimit::Limited(1), DelayPolicy::constant_ms(0)),
    );
    let mut rx = sup.subscribe();
    sup.start();

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    use EventKind::*;
    assert_eq!(
        lifecycle(&events),
        vec![Spawn, Exit, Crash, Sleep, Spawn, Exit, Crash, Stop]
    );
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    let exit = events.iter().find(|e| e.kind == Exit);
    assert_eq!(exit.and_then(|e| e.code), Some(2));
    assert_eq!(exit.and_then(|e| e.signal), None);
}

#[tokio::test]
async fn unlimited_restarts_until_stopped() {
    let sup = build(
        sh("exit 1"),
        config(RestartLimit::Unlimited, DelayPolicy::constant_ms(5)),
    );
    let mut rx = sup.subscribe();
    sup.start();

    let mut spawns = 0;
    collect_until(&mut rx, |ev| {
        if ev.kind == EventKind::Spawn {
            spawns += 1;
        }
        spawns >= 5
    })
    .await;

    sup.stop();
    assert!(matches!(sup.status(), Status::Stopping | Status::Stopped));
    collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(sup.status(), Status::Stopped);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let after = drain(&mut rx);
    assert_eq!(count(&after, EventKind::Spawn), 0, "respawned after stop: {:?}", kinds(&after));
}

#[tokio::test]
async fn stop_running_child() {
    let sup = build(long_app(), Config::default());
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;

    sup.stop();
    assert_eq!(sup.status(), Status::Stopping);

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(lifecycle(&events), vec![EventKind::Exit, EventKind::Stop]);
    assert_eq!(events[0].signal, Some(Signal::SIGTERM as i32));
    assert_eq!(sup.status(), Status::Stopped);
    assert_eq!(sup.restarts(), 0);
    assert!(sup.child().is_none());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let sup = build(long_app(), Config::default());
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;

    sup.stop();
    sup.stop();
    collect_until_kind(&mut rx, EventKind::Stop).await;
    sup.stop();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn stop_while_crashing_cancels_restart() {
    let sup = build(
        sh("exit 1"),
        config(RestartLimit::Limited(5), DelayPolicy::constant_ms(60_000)),
    );
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Sleep).await;
    assert_eq!(sup.status(), Status::Crashing);

    sup.stop();
    assert_eq!(sup.status(), Status::Stopped);
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(kinds(&events), vec![EventKind::Stop]);
}

struct StopOnSpawn {
    sup: OnceLock<Weak<Supervisor>>,
    pause: Duration,
}

impl StopOnSpawn {
    fn new(pause: Duration) -> Arc<Self> {
        Arc::new(Self {
            sup: OnceLock::new(),
            pause,
        })
    }
}

#[async_trait::async_trait]
impl Subscribe for StopOnSpawn {
    async fn on_event(&self, ev: &Event) {
        if ev.kind != EventKind::Spawn {
            return;
        }
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        if let Some(sup) = self.sup.get().and_then(Weak::upgrade) {
            sup.stop();
        }
    }

    fn name(&self) -> &'static str {
        "stop-on-spawn"
    }
}

#[tokio::test]
async fn stop_from_spawn_subscriber() {
    let hook = StopOnSpawn::new(Duration::ZERO);
    let sup = builder(long_app())
        .with_subscribers(vec![hook.clone() as Arc<dyn Subscribe>])
        .build();
    let _ = hook.sup.set(Arc::downgrade(&sup));
    let mut rx = sup.subscribe();
    sup.start();

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(
        lifecycle(&events),
        vec![EventKind::Spawn, EventKind::Exit, EventKind::Stop]
    );
    assert_eq!(count(&events, EventKind::Crash), 0);
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn stop_from_spawn_subscriber_races_fast_crash() {
    let hook = StopOnSpawn::new(Duration::from_millis(1));
    let sup = builder(sh("exit 1"))
        .config(config(RestartLimit::Unlimited, DelayPolicy::constant_ms(200)))
        .with_subscribers(vec![hook.clone() as Arc<dyn Subscribe>])
        .build();
    let _ = hook.sup.set(Arc::downgrade(&sup));
    let mut rx = sup.subscribe();
    sup.start();

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert!(count(&events, EventKind::Spawn) <= 2, "{:?}", kinds(&events));
    assert_eq!(count(&events, EventKind::Stop), 1);
    assert_eq!(sup.status(), Status::Stopped);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let late = drain(&mut rx);
    assert!(late.is_empty(), "events after stop: {:?}", kinds(&late));
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn stop_from_event_stream_right_after_spawn() {
    let sup = build(crash_app(), Config::default());
    let mut rx = sup.subscribe();
    sup.start();

    collect_until_kind(&mut rx, EventKind::Spawn).await;
    sup.stop();
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(count(&events, EventKind::Crash), 0);
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn start_while_stopping_begins_new_episode() {
    let sup = build(long_app(), Config::default());
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;

    sup.stop();
    sup.start();
    assert_eq!(sup.status(), Status::Stopping);

    let events = collect_until_kind(&mut rx, EventKind::Spawn).await;
    assert_eq!(
        lifecycle(&events),
        vec![EventKind::Exit, EventKind::Stop, EventKind::Spawn]
    );
    assert_eq!(events.last().and_then(|e| e.attempt), Some(0));
    assert_eq!(sup.status(), Status::Running);

    sup.stop();
    collect_until_kind(&mut rx, EventKind::Stop).await;
}

#[tokio::test]
async fn start_stop_start() {
    let sup = build(long_app(), Config::default());
    let mut rx = sup.subscribe();

    for _ in 0..2 {
        sup.start();
        assert_eq!(sup.status(), Status::Running);
        collect_until_kind(&mut rx, EventKind::Spawn).await;
        sup.stop();
        collect_until_kind(&mut rx, EventKind::Stop).await;
        assert_eq!(sup.status(), Status::Stopped);
    }
}

#[tokio::test]
async fn external_kill_is_a_crash() {
    let sup = build(
        long_app(),
        config(RestartLimit::Limited(1), DelayPolicy::constant_ms(0)),
    );
    let mut rx = sup.subscribe();
    sup.start();
    let first = collect_until_kind(&mut rx, EventKind::Spawn).await;
    let first_pid = first.last().and_then(|e| e.pid);

    let Some(child) = sup.child() else {
        panic!("child must be running");
    };
    assert_eq!(Some(child.pid()), first_pid);
    child.signal(Signal::SIGKILL).unwrap();

    let events = collect_until_kind(&mut rx, EventKind::Spawn).await;
    assert_eq!(
        lifecycle(&events),
        vec![
            EventKind::Exit,
            EventKind::Crash,
            EventKind::Sleep,
            EventKind::Spawn
        ]
    );
    assert_eq!(events[0].signal, Some(Signal::SIGKILL as i32));
    assert_ne!(events.last().and_then(|e| e.pid), first_pid);
    assert_eq!(sup.restarts(), 1);

    sup.stop();
    collect_until_kind(&mut rx, EventKind::Stop).await;
}

#[tokio::test]
async fn crashed_is_terminal_until_started_again() {
    let sup = build(
        crash_app(),
        config(RestartLimit::Limited(0), DelayPolicy::constant_ms(0)),
    );
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(sup.status(), Status::Crashed);

    sup.stop();
    assert_eq!(sup.status(), Status::Crashed);

    sup.start();
    assert_eq!(sup.status(), Status::Running);
    assert_eq!(sup.restarts(), 0);
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(
        lifecycle(&events),
        vec![EventKind::Spawn, EventKind::Exit, EventKind::Crash, EventKind::Stop]
    );
}

#[tokio::test]
async fn missing_program_crashes() {
    let sup = build(
        CommandSpec::new("/nonexistent/program"),
        config(RestartLimit::Limited(1), DelayPolicy::constant_ms(0)),
    );
    let mut rx = sup.subscribe();
    sup.start();

    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    use EventKind::*;
    assert_eq!(
        kinds(&events),
        vec![Warn, Exit, Crash, Sleep, Warn, Exit, Crash, Stop]
    );
    assert!(events[0].reason.is_some());
    assert_eq!(events[1].pid, None);
    assert_eq!(sup.status(), Status::Crashed);
}

#[tokio::test]
async fn kill_timeout_forces_sigkill() {
    let sup = build(
        sh("trap '' TERM; while :; do sleep 0.05; done"),
        Config {
            kill_timeout: Some(Duration::from_millis(200)),
            ..Config::default()
        },
    );
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    sup.stop();
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(
        kinds(&events),
        vec![EventKind::ForceKill, EventKind::Exit, EventKind::Stop]
    );
    assert_eq!(events[1].signal, Some(Signal::SIGKILL as i32));
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn stop_with_escalates_while_stopping() {
    let sup = build(
        sh("trap '' TERM; while :; do sleep 0.05; done"),
        Config {
            kill_timeout: None,
            ..Config::default()
        },
    );
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    sup.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sup.status(), Status::Stopping);

    sup.stop_with(Signal::SIGKILL);
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(lifecycle(&events), vec![EventKind::Exit, EventKind::Stop]);
    assert_eq!(events[0].signal, Some(Signal::SIGKILL as i32));
}

#[tokio::test]
async fn custom_stop_signal() {
    let sup = build(
        long_app(),
        Config {
            stop_signal: Signal::SIGINT,
            ..Config::default()
        },
    );
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;

    sup.stop();
    let events = collect_until_kind(&mut rx, EventKind::Stop).await;
    assert_eq!(events[0].kind, EventKind::Exit);
    assert_eq!(events[0].signal, Some(Signal::SIGINT as i32));
}

#[tokio::test]
async fn events_carry_name_and_info_tracks_child() {
    let sup = build(
        long_app(),
        Config {
            name: Some("sleeper".into()),
            data: Some(serde_json::json!({"owner": "ops"})),
            ..Config::default()
        },
    );
    let mut rx = sup.subscribe();
    sup.start();
    let events = collect_until_kind(&mut rx, EventKind::Spawn).await;
    assert_eq!(events[0].name.as_deref(), Some("sleeper"));

    let info = sup.info();
    assert_eq!(info.status, Status::Running);
    assert_eq!(info.pid, events[0].pid);
    assert_eq!(info.to_json()["data"]["owner"], "ops");

    sup.stop();
    collect_until_kind(&mut rx, EventKind::Stop).await;
    let info = sup.info();
    assert_eq!(info.status, Status::Stopped);
    assert_eq!(info.pid, None);
}

#[tokio::test]
async fn dropping_supervisor_kills_child() {
    let sup = build(long_app(), Config::default());
    let mut rx = sup.subscribe();
    sup.start();
    collect_until_kind(&mut rx, EventKind::Spawn).await;
    let Some(pid) = sup.child().map(|c| c.pid()) else {
        panic!("child must be running");
    };

    drop(sup);
    let gone = tokio::time::timeout(DEADLINE, async {
        loop {
            let check = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None);
            if check.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(gone.is_ok(), "child {pid} outlived its supervisor");
}
