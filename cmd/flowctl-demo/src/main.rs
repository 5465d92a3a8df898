//! Demonstration daemon wiring the conjunction-id allocator, the
//! logical-flow cache, and the incremental processing engine behind a
//! UNIX-socket text control interface.
//!
//! Out of scope (spec.md §1): the real southbound database client, the
//! logical-flow expression compiler, and the daemon's own argument
//! parsing — this just drives enough of a reconciliation loop to show
//! the three crates working together.

use conj_ids::ConjIdAllocator;
use flowctl_core::{ctl_info, env::env_get, log, LflowUuid};
use inc_engine::{ChangeTracker, Engine, EngineBuilder, EngineNode, NodeState, TableAdapterNode};
use lflow_cache::LflowCache;
use std::any::Any;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A tracker standing in for a southbound database table: changes are
/// injected from outside the engine (the `Arc<AtomicBool>` stands in
/// for a real row insert), observed once by `has_tracked_changes`.
#[derive(Debug, Default)]
struct FakeTable {
    dirty: Arc<std::sync::atomic::AtomicBool>,
}

impl ChangeTracker for FakeTable {
    fn has_tracked_changes(&mut self) -> bool {
        self.dirty.load(std::sync::atomic::Ordering::Acquire)
    }
    fn clear_tracked_changes(&mut self) {
        self.dirty.store(false, std::sync::atomic::Ordering::Release);
    }
}

/// Terminal node driving the LFC/CIA with the effects of a
/// reconciliation round; owns them as its node data.
#[derive(Debug)]
struct FlowInstaller {
    cia: ConjIdAllocator,
    lfc: LflowCache,
    installs: u64,
}

impl EngineNode for FlowInstaller {
    fn name(&self) -> &str {
        "flow_installer"
    }

    fn run(&mut self) -> NodeState {
        let uuid = LflowUuid::from_part0(self.installs as u32 + 1);
        let id = self.cia.alloc(uuid, 1);
        if id != 0 {
            self.lfc.add_conj_id(uuid, id);
            self.installs += 1;
        }
        NodeState::Updated
    }

    fn data(&self) -> &dyn Any {
        &self.installs
    }

    fn data_mut(&mut self) -> &mut dyn Any {
        &mut self.installs
    }
}

fn main() {
    log::init_from_env();
    ctl_info!("flowctl-demo starting");

    let mut builder = EngineBuilder::new();
    let port_binding_dirty = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let port_binding = builder
        .add_node(
            Box::new(TableAdapterNode::new(
                "port_binding",
                FakeTable {
                    dirty: Arc::clone(&port_binding_dirty),
                },
            )),
            vec![],
        )
        .expect("leaf node has no inputs to exceed MAX_INPUT");

    let installer = builder
        .add_node(
            Box::new(FlowInstaller {
                cia: ConjIdAllocator::new(),
                lfc: {
                    let mut lfc = LflowCache::create();
                    lfc.configure(
                        true,
                        env_get("FLOWCTL_LFC_CAPACITY", 10_000u32),
                        env_get("FLOWCTL_LFC_MAX_KIB", 65_536u64),
                    );
                    lfc
                },
                installs: 0,
            }),
            vec![(port_binding, None)],
        )
        .expect("one input never exceeds MAX_INPUT");

    let engine = Arc::new(Mutex::new(builder.build().expect("DAG has no cycles")));

    let socket_path = std::env::temp_dir().join(format!("flowctl-demo-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&socket_path);
    let control_engine = Arc::clone(&engine);
    let control_path = socket_path.clone();
    std::thread::spawn(move || run_control_socket(&control_path, control_engine));

    let rounds: u32 = env_get("FLOWCTL_DEMO_ROUNDS", 3);
    for round in 0..rounds {
        {
            let mut engine = engine.lock().unwrap();
            engine.init_run();
            port_binding_dirty.store(true, std::sync::atomic::Ordering::Release);
            engine.run(true);
            ctl_info!(
                "round {round}: installer state={:?}, installs={}",
                engine.state(installer),
                engine.get_data_as::<u64>(installer).copied().unwrap_or(0)
            );
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let _ = std::fs::remove_file(&socket_path);
    ctl_info!("flowctl-demo exiting");
}

fn run_control_socket(path: &std::path::Path, engine: Arc<Mutex<Engine>>) {
    let listener = match UnixListener::bind(path) {
        Ok(l) => l,
        Err(e) => {
            flowctl_core::ctl_warn!("control socket unavailable: {e}");
            return;
        }
    };
    for stream in listener.incoming() {
        let Ok(mut stream) = stream else { continue };
        let mut reader = BufReader::new(stream.try_clone().expect("clone unix stream"));
        let mut line = String::new();
        if reader.read_line(&mut line).is_ok() && !line.is_empty() {
            let reply = engine.lock().unwrap().handle_command(line.trim());
            let _ = stream.write_all(reply.as_bytes());
        }
    }
}
