mod config;
mod session;

use phantom_repair::{ArchiveModel, ClassStub, RepairConfig, RepairReport, RepairSession, Result};
use phantom_types::{parse_method_descriptor, MethodDescriptor, Type};
use serde_json::Value;

pub(crate) fn t(name: &str) -> Type {
    Type::object(name)
}

pub(crate) fn desc(text: &str) -> MethodDescriptor {
    parse_method_descriptor(text).unwrap()
}

pub(crate) fn archive(json: Value) -> ArchiveModel {
    serde_json::from_value(json).unwrap()
}

pub(crate) fn session(json: Value) -> RepairSession {
    RepairSession::new(RepairConfig::default(), archive(json)).unwrap()
}

pub(crate) fn repair(json: Value) -> Result<RepairReport> {
    session(json).run()
}

/// The generated class for `name`; panics when there is none.
pub(crate) fn stub<'r>(report: &'r RepairReport, name: &str) -> &'r ClassStub {
    report
        .phantoms
        .iter()
        .find(|stub| stub.internal_name == t(name))
        .unwrap_or_else(|| panic!("no class generated for {name}"))
}
