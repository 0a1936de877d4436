#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use phantom_repair::{ArchiveModel, RepairConfig, RepairSession};

mod utils;

fn run_one(input: &str) {
    // Archive models come from untrusted class files. The goal is simply
    // "never panic / never hang": every failure must surface as an error.
    let Ok(archive) = ArchiveModel::from_json(input) else {
        return;
    };
    let mut config = RepairConfig::default();
    config.solver.max_placement_attempts = 4;
    let Ok(mut session) = RepairSession::new(config, archive) else {
        return;
    };
    if let Ok(report) = session.run() {
        for stub in &report.phantoms {
            let _ = stub.methods.len();
            let _ = stub.fields.len();
        }
    }
}

fn runner() -> &'static utils::Runner {
    static RUNNER: OnceLock<utils::Runner> = OnceLock::new();
    RUNNER.get_or_init(|| utils::Runner::new("fuzz_archive_repair", run_one))
}

fuzz_target!(|data: &[u8]| {
    runner().run(data);
});
