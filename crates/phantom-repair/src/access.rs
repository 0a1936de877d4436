use std::fmt;

use indexmap::{IndexMap, IndexSet};
use phantom_flow::{FieldOp, InvokeOp};
use phantom_solver::Constraint;
use phantom_types::{MethodDescriptor, Type};

use crate::error::{RepairError, Result};
use crate::flags::{
    ACC_ABSTRACT, ACC_ANNOTATION, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC,
};

/// How a phantom method is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodEvent {
    Virtual,
    Special,
    Static,
    /// `invokeinterface`, or a method that only resolves through interfaces.
    Interface,
}

impl From<InvokeOp> for MethodEvent {
    fn from(op: InvokeOp) -> Self {
        match op {
            InvokeOp::Virtual => MethodEvent::Virtual,
            InvokeOp::Special => MethodEvent::Special,
            InvokeOp::Static => MethodEvent::Static,
            InvokeOp::Interface => MethodEvent::Interface,
        }
    }
}

impl fmt::Display for MethodEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodEvent::Virtual => "invokevirtual",
            MethodEvent::Special => "invokespecial",
            MethodEvent::Static => "invokestatic",
            MethodEvent::Interface => "invokeinterface",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodState {
    Init,
    Virtual,
    Static,
    Interface,
}

impl MethodState {
    fn on(self, event: MethodEvent) -> Option<MethodState> {
        use MethodEvent as E;
        use MethodState as S;
        match (self, event) {
            (S::Init | S::Virtual, E::Virtual | E::Special) => Some(S::Virtual),
            (S::Init | S::Static, E::Static) => Some(S::Static),
            (S::Init | S::Interface, E::Interface) => Some(S::Interface),
            _ => None,
        }
    }

    #[must_use]
    pub fn access(self) -> u16 {
        match self {
            MethodState::Init | MethodState::Virtual => ACC_PUBLIC,
            MethodState::Static => ACC_PUBLIC | ACC_STATIC,
            MethodState::Interface => ACC_PUBLIC | ACC_ABSTRACT,
        }
    }
}

impl fmt::Display for MethodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodState::Init => "nothing",
            MethodState::Virtual => "an instance method",
            MethodState::Static => "a static method",
            MethodState::Interface => "an interface method",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Init,
    Instance,
    InstanceFinal,
    Static,
    StaticFinal,
}

impl FieldState {
    /// A field that is only ever read is assumed final; the first write
    /// clears that.
    fn on(self, op: FieldOp) -> Option<FieldState> {
        use FieldState as S;
        match (self, op) {
            (S::Init | S::InstanceFinal, FieldOp::Getfield) => Some(S::InstanceFinal),
            (S::Instance, FieldOp::Getfield) => Some(S::Instance),
            (S::Init | S::Instance | S::InstanceFinal, FieldOp::Putfield) => Some(S::Instance),
            (S::Init | S::StaticFinal, FieldOp::Getstatic) => Some(S::StaticFinal),
            (S::Static, FieldOp::Getstatic) => Some(S::Static),
            (S::Init | S::Static | S::StaticFinal, FieldOp::Putstatic) => Some(S::Static),
            _ => None,
        }
    }

    #[must_use]
    pub fn access(self) -> u16 {
        match self {
            FieldState::Init | FieldState::Instance => ACC_PUBLIC,
            FieldState::InstanceFinal => ACC_PUBLIC | ACC_FINAL,
            FieldState::Static => ACC_PUBLIC | ACC_STATIC,
            FieldState::StaticFinal => ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
        }
    }
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldState::Init => "nothing",
            FieldState::Instance | FieldState::InstanceFinal => "an instance field",
            FieldState::Static | FieldState::StaticFinal => "a static field",
        })
    }
}

fn field_op_name(op: FieldOp) -> &'static str {
    match op {
        FieldOp::Getstatic => "getstatic",
        FieldOp::Putstatic => "putstatic",
        FieldOp::Getfield => "getfield",
        FieldOp::Putfield => "putfield",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassEvent {
    IsInterface,
    IsAnnotation,
}

/// Tracks every use of every phantom member and derives access flags, plus
/// the kind constraints those uses imply for the owners.
#[derive(Debug, Clone, Default)]
pub struct AccessMachines {
    methods: IndexMap<(Type, String, MethodDescriptor), MethodState>,
    fields: IndexMap<(Type, String), (Type, FieldState)>,
    classes: IndexMap<Type, u16>,
    constraints: IndexSet<Constraint>,
}

impl AccessMachines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call of `owner.name descriptor` and returns the access flags
    /// the method needs so far.
    pub fn invoke(
        &mut self,
        owner: &Type,
        name: &str,
        descriptor: &MethodDescriptor,
        event: MethodEvent,
    ) -> Result<u16> {
        let state = self
            .methods
            .entry((owner.clone(), name.to_owned(), descriptor.clone()))
            .or_insert(MethodState::Init);
        let next = state.on(event).ok_or_else(|| RepairError::IllegalTransition {
            owner: owner.clone(),
            member: format!("{name}{descriptor}"),
            from: state.to_string(),
            event: event.to_string(),
        })?;
        *state = next;

        let constraint = match event {
            MethodEvent::Interface => Constraint::isa_interface(owner.clone()),
            MethodEvent::Virtual | MethodEvent::Special | MethodEvent::Static => {
                Constraint::isa_class(owner.clone())
            }
        };
        self.constraints.insert(constraint);
        tracing::trace!(%owner, name, %descriptor, %event, ?next, "method access");
        Ok(next.access())
    }

    /// Records a field access and returns the access flags the field needs
    /// so far. One field cannot be used with two descriptors.
    pub fn access_field(
        &mut self,
        owner: &Type,
        name: &str,
        descriptor: &Type,
        op: FieldOp,
    ) -> Result<u16> {
        let (known, state) = self
            .fields
            .entry((owner.clone(), name.to_owned()))
            .or_insert_with(|| (descriptor.clone(), FieldState::Init));
        if *known != *descriptor {
            return Err(RepairError::ConflictingDescriptor {
                owner: owner.clone(),
                member: name.to_owned(),
                first: known.clone(),
                second: descriptor.clone(),
            });
        }
        let next = state.on(op).ok_or_else(|| RepairError::IllegalTransition {
            owner: owner.clone(),
            member: name.to_owned(),
            from: state.to_string(),
            event: field_op_name(op).to_owned(),
        })?;
        *state = next;

        // Interfaces may declare constants, so a plain static read says
        // nothing about the owner.
        if op != FieldOp::Getstatic {
            self.constraints.insert(Constraint::isa_class(owner.clone()));
        }
        tracing::trace!(%owner, name, op = field_op_name(op), ?next, "field access");
        Ok(next.access())
    }

    /// Records what a use reveals about a phantom type itself and returns its
    /// class access flags.
    pub fn class_event(&mut self, ty: &Type, event: ClassEvent) -> u16 {
        let access = self.classes.entry(ty.clone()).or_insert(ACC_PUBLIC);
        *access |= match event {
            ClassEvent::IsInterface => ACC_INTERFACE | ACC_ABSTRACT,
            ClassEvent::IsAnnotation => ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        };
        self.constraints.insert(Constraint::isa_interface(ty.clone()));
        *access
    }

    /// Kind constraints implied by the uses seen so far.
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.constraints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phantom_types::parse_method_descriptor;
    use pretty_assertions::assert_eq;

    fn t(name: &str) -> Type {
        Type::object(name)
    }

    #[test]
    fn method_uses_fix_access_and_kind() {
        let mut machines = AccessMachines::new();
        let desc = parse_method_descriptor("(I)V").unwrap();

        assert_eq!(
            machines.invoke(&t("ph/A"), "m", &desc, MethodEvent::Special).unwrap(),
            ACC_PUBLIC
        );
        assert_eq!(
            machines.invoke(&t("ph/A"), "m", &desc, MethodEvent::Virtual).unwrap(),
            ACC_PUBLIC
        );
        assert_eq!(
            machines.invoke(&t("ph/A"), "s", &desc, MethodEvent::Static).unwrap(),
            ACC_PUBLIC | ACC_STATIC
        );
        assert_eq!(
            machines.invoke(&t("ph/I"), "m", &desc, MethodEvent::Interface).unwrap(),
            ACC_PUBLIC | ACC_ABSTRACT
        );
        assert_eq!(
            machines.constraints().cloned().collect::<Vec<_>>(),
            vec![Constraint::isa_class(t("ph/A")), Constraint::isa_interface(t("ph/I"))]
        );
    }

    #[test]
    fn static_and_instance_calls_do_not_mix() {
        let mut machines = AccessMachines::new();
        let desc = parse_method_descriptor("()V").unwrap();
        machines.invoke(&t("ph/A"), "m", &desc, MethodEvent::Virtual).unwrap();

        let err = machines
            .invoke(&t("ph/A"), "m", &desc, MethodEvent::Static)
            .unwrap_err();
        assert!(err.is_unsatisfiable());
        assert_eq!(
            err.to_string(),
            "`ph/A.m()V` cannot be used by invokestatic after it was used as an instance method"
        );
    }

    #[test]
    fn fields_are_final_until_written() {
        let mut machines = AccessMachines::new();
        let owner = t("ph/A");

        assert_eq!(
            machines.access_field(&owner, "f", &Type::STRING, FieldOp::Getfield).unwrap(),
            ACC_PUBLIC | ACC_FINAL
        );
        assert_eq!(
            machines.access_field(&owner, "f", &Type::STRING, FieldOp::Putfield).unwrap(),
            ACC_PUBLIC
        );
        assert_eq!(
            machines.access_field(&owner, "f", &Type::STRING, FieldOp::Getfield).unwrap(),
            ACC_PUBLIC
        );

        assert_eq!(
            machines.access_field(&owner, "S", &Type::STRING, FieldOp::Getstatic).unwrap(),
            ACC_PUBLIC | ACC_STATIC | ACC_FINAL
        );
        assert_eq!(
            machines.access_field(&owner, "S", &Type::STRING, FieldOp::Putstatic).unwrap(),
            ACC_PUBLIC | ACC_STATIC
        );

        assert!(matches!(
            machines.access_field(&owner, "f", &Type::STRING, FieldOp::Getstatic),
            Err(RepairError::IllegalTransition { .. })
        ));
        assert!(matches!(
            machines.access_field(&owner, "f", &Type::OBJECT, FieldOp::Getfield),
            Err(RepairError::ConflictingDescriptor { .. })
        ));
    }

    #[test]
    fn constant_reads_leave_the_owner_kind_open() {
        let mut machines = AccessMachines::new();
        machines
            .access_field(&t("ph/Consts"), "X", &Type::STRING, FieldOp::Getstatic)
            .unwrap();
        assert_eq!(machines.constraints().count(), 0);
    }

    #[test]
    fn class_events_make_interfaces() {
        let mut machines = AccessMachines::new();
        assert_eq!(
            machines.class_event(&t("ph/I"), ClassEvent::IsInterface),
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT
        );
        assert_eq!(
            machines.class_event(&t("ph/I"), ClassEvent::IsAnnotation),
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION
        );
        assert_eq!(
            machines.constraints().cloned().collect::<Vec<_>>(),
            vec![Constraint::isa_interface(t("ph/I"))]
        );
    }
}
