#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;

mod utils;

fn run_one(input: &str) {
    if let Ok(ty) = phantom_types::parse_field_descriptor(input) {
        // Descriptors print back to themselves.
        assert_eq!(ty.descriptor(), input);
    }
    if let Ok(method) = phantom_types::parse_method_descriptor(input) {
        assert_eq!(method.to_string(), input);
    }
}

fn runner() -> &'static utils::Runner {
    static RUNNER: OnceLock<utils::Runner> = OnceLock::new();
    RUNNER.get_or_init(|| utils::Runner::new("fuzz_descriptor", run_one))
}

fuzz_target!(|data: &[u8]| {
    runner().run(data);
});
