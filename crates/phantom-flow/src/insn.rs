use std::fmt;

use phantom_types::{BaseType, MethodDescriptor, Type};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Computational kind of a local load/store or a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

/// Operand kind of arithmetic, negation and comparison instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

impl NumKind {
    #[must_use]
    pub const fn base_type(self) -> BaseType {
        match self {
            NumKind::Int => BaseType::Int,
            NumKind::Long => BaseType::Long,
            NumKind::Float => BaseType::Float,
            NumKind::Double => BaseType::Double,
        }
    }
}

/// Element kind of `xaload`/`xastore`. `Byte` covers `boolean[]` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Byte,
    Char,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpOp {
    Goto,
    Ifeq,
    Ifne,
    Iflt,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpeq,
    IfIcmpne,
    IfIcmplt,
    IfIcmpge,
    IfIcmpgt,
    IfIcmple,
    IfAcmpeq,
    IfAcmpne,
    Ifnull,
    Ifnonnull,
}

impl JumpOp {
    /// Number of operand-stack values the jump consumes.
    #[must_use]
    pub const fn operands(self) -> usize {
        match self {
            JumpOp::Goto => 0,
            JumpOp::Ifeq
            | JumpOp::Ifne
            | JumpOp::Iflt
            | JumpOp::Ifge
            | JumpOp::Ifgt
            | JumpOp::Ifle
            | JumpOp::Ifnull
            | JumpOp::Ifnonnull => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
}

impl FieldOp {
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, FieldOp::Getstatic | FieldOp::Putstatic)
    }

    #[must_use]
    pub const fn is_put(self) -> bool {
        matches!(self, FieldOp::Putstatic | FieldOp::Putfield)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeOp {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeOp {
    #[must_use]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, InvokeOp::Static)
    }
}

/// Operand of `ldc` and the short constant-pushing forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// A class literal.
    Type(#[serde(with = "phantom_types::internal_name")] Type),
    MethodType(MethodDescriptor),
    MethodHandle,
}

impl Constant {
    /// Type of the value pushed for this constant.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Base(BaseType::Int),
            Constant::Long(_) => Type::Base(BaseType::Long),
            Constant::Float(_) => Type::Base(BaseType::Float),
            Constant::Double(_) => Type::Base(BaseType::Double),
            Constant::String(_) => Type::STRING,
            Constant::Type(_) => Type::CLASS,
            Constant::MethodType(_) => Type::METHOD_TYPE,
            Constant::MethodHandle => Type::METHOD_HANDLE,
        }
    }
}

/// One bytecode instruction, or one of the pseudo-instructions (labels, line
/// numbers, stack map frames) that occupy a position in the instruction list
/// without executing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Insn {
    Label {
        id: LabelId,
    },
    LineNumber {
        line: u32,
    },
    Frame,
    Nop,
    AconstNull,
    Ldc {
        value: Constant,
    },
    Load {
        kind: ValueKind,
        var: u16,
    },
    Store {
        kind: ValueKind,
        var: u16,
    },
    ArrayLoad {
        kind: ArrayKind,
    },
    ArrayStore {
        kind: ArrayKind,
    },
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arith {
        kind: NumKind,
        arith: ArithOp,
    },
    Neg {
        kind: NumKind,
    },
    Iinc {
        var: u16,
        delta: i16,
    },
    Convert {
        from: NumKind,
        to: BaseType,
    },
    Compare {
        kind: NumKind,
    },
    Jump {
        jump: JumpOp,
        target: LabelId,
    },
    Switch {
        default: LabelId,
        targets: Vec<LabelId>,
    },
    Return {
        #[serde(default)]
        kind: Option<ValueKind>,
    },
    Field {
        field: FieldOp,
        #[serde(with = "phantom_types::internal_name")]
        owner: Type,
        name: String,
        descriptor: Type,
    },
    Invoke {
        invoke: InvokeOp,
        #[serde(with = "phantom_types::internal_name")]
        owner: Type,
        name: String,
        descriptor: MethodDescriptor,
    },
    InvokeDynamic {
        name: String,
        descriptor: MethodDescriptor,
    },
    New {
        #[serde(with = "phantom_types::internal_name")]
        ty: Type,
    },
    NewArray {
        element: BaseType,
    },
    Anewarray {
        #[serde(with = "phantom_types::internal_name")]
        component: Type,
    },
    Multianewarray {
        ty: Type,
        dims: u8,
    },
    ArrayLength,
    Athrow,
    Checkcast {
        #[serde(with = "phantom_types::internal_name")]
        ty: Type,
    },
    Instanceof {
        #[serde(with = "phantom_types::internal_name")]
        ty: Type,
    },
    MonitorEnter,
    MonitorExit,
}

impl Insn {
    /// Whether control never continues with the next instruction.
    #[must_use]
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            Insn::Return { .. }
                | Insn::Athrow
                | Insn::Switch { .. }
                | Insn::Jump {
                    jump: JumpOp::Goto,
                    ..
                }
        )
    }

    /// Pseudo-instructions occupy a slot in the list but do nothing.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Insn::Label { .. } | Insn::LineNumber { .. } | Insn::Frame)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryCatchBlock {
    pub start: LabelId,
    pub end: LabelId,
    pub handler: LabelId,
    /// `None` for `finally` handlers, which catch everything.
    #[serde(default, with = "phantom_types::internal_name::option")]
    pub catch_type: Option<Type>,
}

/// Entry of the (debug) local variable table. Active from `start` up to, but
/// not including, `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: Type,
    pub start: LabelId,
    pub end: LabelId,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    pub max_locals: u16,
    #[serde(default)]
    pub max_stack: Option<u16>,
    pub instructions: Vec<Insn>,
    #[serde(default)]
    pub try_catch: Vec<TryCatchBlock>,
    #[serde(default)]
    pub local_variables: Vec<LocalVariable>,
}

impl MethodBody {
    /// Every type named by an instruction operand, handler or local variable
    /// descriptor, in order of appearance (with repetitions).
    pub fn referenced_types(&self) -> impl Iterator<Item = &Type> + '_ {
        let insns = self.instructions.iter().flat_map(|insn| {
            let types: Box<dyn Iterator<Item = &Type> + '_> = match insn {
                Insn::Ldc {
                    value: Constant::Type(ty),
                } => Box::new(std::iter::once(ty)),
                Insn::Ldc {
                    value: Constant::MethodType(desc),
                } => Box::new(desc.types()),
                Insn::Field {
                    owner, descriptor, ..
                } => Box::new([owner, descriptor].into_iter()),
                Insn::Invoke {
                    owner, descriptor, ..
                } => Box::new(std::iter::once(owner).chain(descriptor.types())),
                Insn::InvokeDynamic { descriptor, .. } => Box::new(descriptor.types()),
                Insn::New { ty }
                | Insn::Multianewarray { ty, .. }
                | Insn::Checkcast { ty }
                | Insn::Instanceof { ty } => Box::new(std::iter::once(ty)),
                Insn::Anewarray { component } => Box::new(std::iter::once(component)),
                _ => Box::new(std::iter::empty()),
            };
            types
        });
        insns
            .chain(self.try_catch.iter().filter_map(|tcb| tcb.catch_type.as_ref()))
            .chain(self.local_variables.iter().map(|local| &local.descriptor))
    }
}
