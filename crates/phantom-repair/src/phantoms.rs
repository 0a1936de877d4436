use indexmap::{IndexMap, IndexSet};
use phantom_types::{MethodDescriptor, ReturnType, Type};
use serde::Serialize;

use crate::config::{OutputConfig, StubBodies};
use crate::flags::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER};

pub const CONSTRUCTOR: &str = "<init>";
pub const CLASS_INITIALIZER: &str = "<clinit>";

/// Code of a generated method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StubBody {
    /// No code at all.
    Abstract,
    /// `throw new UnsupportedOperationException()`.
    ThrowUnsupported,
    /// `aload_0; invokespecial superclass.<init>()V; return`.
    CallSuper {
        #[serde(with = "phantom_types::internal_name")]
        superclass: Type,
    },
}

/// One change to a phantom class, applied in order by
/// [`PhantomClass::materialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    SetAccess {
        access: u16,
    },
    SetSuperclass {
        superclass: Type,
    },
    MakeInterface,
    AddInterfaces {
        interfaces: Vec<Type>,
    },
    AddField {
        access: u16,
        name: String,
        descriptor: Type,
    },
    AddMethod {
        access: u16,
        name: String,
        descriptor: MethodDescriptor,
        body: StubBody,
    },
    AddInnerClass {
        inner: Type,
        outer: Type,
        access: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldStub {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodStub {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub body: StubBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InnerClassStub {
    #[serde(with = "phantom_types::internal_name")]
    pub inner: Type,
    #[serde(with = "phantom_types::internal_name")]
    pub outer: Type,
    pub access_flags: u16,
}

/// A generated class, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassStub {
    #[serde(with = "phantom_types::internal_name")]
    pub internal_name: Type,
    pub access_flags: u16,
    #[serde(with = "phantom_types::internal_name::option")]
    pub super_class: Option<Type>,
    #[serde(with = "phantom_types::internal_name::seq")]
    pub interfaces: Vec<Type>,
    pub inner_classes: Vec<InnerClassStub>,
    pub fields: Vec<FieldStub>,
    pub methods: Vec<MethodStub>,
    pub version: u16,
}

impl ClassStub {
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    #[must_use]
    pub fn method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&MethodStub> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == *descriptor)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldStub> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A phantom type under construction: a public class extending
/// `java/lang/Object`, plus the patches collected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomClass {
    ty: Type,
    version: u16,
    patches: Vec<Patch>,
}

impl PhantomClass {
    #[must_use]
    pub fn new(ty: Type, version: u16) -> Self {
        Self {
            ty,
            version,
            patches: Vec::new(),
        }
    }

    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn push(&mut self, patch: Patch) {
        tracing::trace!(class = %self.ty, ?patch, "patching phantom class");
        self.patches.push(patch);
    }

    /// Methods added so far, the last access winning.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodDescriptor, u16)> + '_ {
        let mut methods = IndexMap::new();
        for patch in &self.patches {
            if let Patch::AddMethod {
                access,
                name,
                descriptor,
                ..
            } = patch
            {
                methods.insert((name.as_str(), descriptor), *access);
            }
        }
        methods
            .into_iter()
            .map(|((name, descriptor), access)| (name, descriptor, access))
    }

    /// Folds the patches into a class.
    ///
    /// Interfaces lose their constructors and every instance method becomes
    /// abstract. A class gets a no-argument constructor calling its
    /// superclass's unless one was added, and turns abstract when it holds an
    /// abstract method.
    #[must_use]
    pub fn materialize(&self) -> ClassStub {
        let mut access = ACC_PUBLIC | ACC_SUPER;
        let mut superclass = Type::OBJECT;
        let mut interface = false;
        let mut interfaces = IndexSet::new();
        let mut fields = IndexMap::new();
        let mut methods = IndexMap::new();
        let mut inner_classes = IndexMap::new();

        for patch in &self.patches {
            match patch {
                Patch::SetAccess { access: flags } => access = *flags,
                Patch::SetSuperclass { superclass: sup } => superclass = sup.clone(),
                Patch::MakeInterface => interface = true,
                Patch::AddInterfaces { interfaces: added } => {
                    interfaces.extend(added.iter().cloned());
                }
                Patch::AddField {
                    access,
                    name,
                    descriptor,
                } => {
                    fields.insert(
                        name.clone(),
                        FieldStub {
                            access_flags: *access,
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                        },
                    );
                }
                Patch::AddMethod {
                    access,
                    name,
                    descriptor,
                    body,
                } => {
                    methods.insert(
                        (name.clone(), descriptor.clone()),
                        MethodStub {
                            access_flags: *access,
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                            body: body.clone(),
                        },
                    );
                }
                Patch::AddInnerClass {
                    inner,
                    outer,
                    access,
                } => {
                    inner_classes.insert(
                        inner.clone(),
                        InnerClassStub {
                            inner: inner.clone(),
                            outer: outer.clone(),
                            access_flags: *access,
                        },
                    );
                }
            }
        }

        if interface || access & ACC_INTERFACE != 0 {
            access = (access | ACC_INTERFACE | ACC_ABSTRACT) & !ACC_SUPER;
            superclass = Type::OBJECT;
            methods.retain(|(name, _), _| name != CONSTRUCTOR);
            for method in methods.values_mut() {
                if method.access_flags & ACC_STATIC == 0 {
                    method.access_flags |= ACC_ABSTRACT;
                    method.body = StubBody::Abstract;
                }
            }
        } else {
            let default_ctor = (CONSTRUCTOR.to_owned(), no_arg_constructor());
            if !methods.keys().any(|(name, _)| name == CONSTRUCTOR) {
                methods.insert(
                    default_ctor.clone(),
                    MethodStub {
                        access_flags: ACC_PUBLIC,
                        name: default_ctor.0,
                        descriptor: default_ctor.1,
                        body: StubBody::CallSuper {
                            superclass: superclass.clone(),
                        },
                    },
                );
            }
            if methods
                .values()
                .any(|method| method.access_flags & ACC_ABSTRACT != 0)
            {
                access |= ACC_ABSTRACT;
            }
        }

        ClassStub {
            internal_name: self.ty.clone(),
            access_flags: access,
            super_class: Some(superclass),
            interfaces: interfaces.into_iter().collect(),
            inner_classes: inner_classes.into_values().collect(),
            fields: fields.into_values().collect(),
            methods: methods.into_values().collect(),
            version: self.version,
        }
    }
}

fn no_arg_constructor() -> MethodDescriptor {
    MethodDescriptor {
        params: Vec::new(),
        return_type: ReturnType::Void,
    }
}

/// Every phantom type of a repair, in discovery order.
#[derive(Debug, Clone)]
pub struct Phantoms {
    version: u16,
    bodies: StubBodies,
    classes: Vec<PhantomClass>,
    index: IndexMap<Type, usize>,
}

impl Phantoms {
    #[must_use]
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            version: output.class_version,
            bodies: output.stub_bodies,
            classes: Vec::new(),
            index: IndexMap::new(),
        }
    }

    /// Registers `ty` (the element type, for arrays). Returns whether it was
    /// new. Primitive types are ignored.
    pub fn register(&mut self, ty: &Type) -> bool {
        let ty = ty.element();
        if !ty.is_object() || self.index.contains_key(ty) {
            return false;
        }
        tracing::debug!(phantom = %ty, "found phantom type");
        self.index.insert(ty.clone(), self.classes.len());
        self.classes.push(PhantomClass::new(ty.clone(), self.version));
        true
    }

    #[must_use]
    pub fn contains(&self, ty: &Type) -> bool {
        self.index.contains_key(ty)
    }

    #[must_use]
    pub fn get(&self, ty: &Type) -> Option<&PhantomClass> {
        self.index.get(ty).map(|&at| &self.classes[at])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhantomClass> + '_ {
        self.classes.iter()
    }

    pub fn types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.index.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Applies `patch` to a phantom, registering it first if needed.
    pub fn patch(&mut self, ty: &Type, patch: Patch) {
        self.register(ty);
        if let Some(&at) = self.index.get(ty.element()) {
            self.classes[at].push(patch);
        }
    }

    pub fn add_field(&mut self, owner: &Type, access: u16, name: &str, descriptor: &Type) {
        self.patch(
            owner,
            Patch::AddField {
                access,
                name: name.to_owned(),
                descriptor: descriptor.clone(),
            },
        );
    }

    /// Adds a method with a body that suits its access flags and the
    /// configured stub style.
    pub fn add_method(&mut self, owner: &Type, access: u16, name: &str, descriptor: &MethodDescriptor) {
        let instance = access & ACC_STATIC == 0 && name != CONSTRUCTOR && name != CLASS_INITIALIZER;
        let (access, body) = if access & ACC_ABSTRACT != 0 {
            (access, StubBody::Abstract)
        } else if instance && self.bodies == StubBodies::Abstract {
            (access | ACC_ABSTRACT, StubBody::Abstract)
        } else {
            (access, StubBody::ThrowUnsupported)
        };
        self.patch(
            owner,
            Patch::AddMethod {
                access,
                name: name.to_owned(),
                descriptor: descriptor.clone(),
                body,
            },
        );
    }

    #[must_use]
    pub fn materialize(&self) -> Vec<ClassStub> {
        self.classes.iter().map(PhantomClass::materialize).collect()
    }
}
