use std::path::Path;

use phantom_flow::MethodBody;
use phantom_hierarchy::ClassHierarchy;
use phantom_types::{MethodDescriptor, Type};
use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};
use crate::flags::{ACC_ABSTRACT, ACC_ANNOTATION, ACC_INTERFACE, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};

fn public() -> u16 {
    ACC_PUBLIC
}

/// A program to repair: the classes of the archive, plus the library types
/// they can see. Anything referenced but declared in neither is a phantom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveModel {
    #[serde(default)]
    pub classes: Vec<ClassModel>,
    #[serde(default)]
    pub library: Vec<LibraryType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    #[serde(with = "phantom_types::internal_name")]
    pub name: Type,
    #[serde(default = "public")]
    pub access: u16,
    /// Absent means `java/lang/Object`.
    #[serde(default, with = "phantom_types::internal_name::option")]
    pub superclass: Option<Type>,
    #[serde(default, with = "phantom_types::internal_name::seq")]
    pub interfaces: Vec<Type>,
    #[serde(default)]
    pub fields: Vec<FieldModel>,
    #[serde(default)]
    pub methods: Vec<MethodModel>,
    #[serde(default)]
    pub annotations: Vec<AnnotationModel>,
}

impl ClassModel {
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.access & ACC_ANNOTATION != 0
    }

    fn declaration(&self) -> Declaration<'_> {
        Declaration {
            name: &self.name,
            interface: self.is_interface(),
            superclass: self.superclass.as_ref(),
            interfaces: &self.interfaces,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldModel {
    #[serde(default = "public")]
    pub access: u16,
    pub name: String,
    pub descriptor: Type,
    #[serde(default)]
    pub annotations: Vec<AnnotationModel>,
}

impl FieldModel {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodModel {
    #[serde(default = "public")]
    pub access: u16,
    pub name: String,
    pub descriptor: MethodDescriptor,
    /// Declared `throws` clause.
    #[serde(default, with = "phantom_types::internal_name::seq")]
    pub exceptions: Vec<Type>,
    #[serde(default)]
    pub annotations: Vec<AnnotationModel>,
    /// `None` for abstract and native methods.
    #[serde(default)]
    pub body: Option<MethodBody>,
}

impl MethodModel {
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access & ACC_PRIVATE != 0
    }
}

/// An annotation applied to a declaration. Reads either a bare class name or
/// `{"type": ..., "elements": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AnnotationRepr")]
pub struct AnnotationModel {
    #[serde(rename = "type", with = "phantom_types::internal_name")]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<AnnotationElement>,
}

impl AnnotationModel {
    #[must_use]
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            elements: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationRepr {
    Name(#[serde(with = "phantom_types::internal_name")] Type),
    Full {
        #[serde(rename = "type", with = "phantom_types::internal_name")]
        ty: Type,
        #[serde(default)]
        elements: Vec<AnnotationElement>,
    },
}

impl From<AnnotationRepr> for AnnotationModel {
    fn from(repr: AnnotationRepr) -> Self {
        match repr {
            AnnotationRepr::Name(ty) => AnnotationModel::new(ty),
            AnnotationRepr::Full { ty, elements } => AnnotationModel { ty, elements },
        }
    }
}

/// A `name = value` pair of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationElement {
    pub name: String,
    pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementValue {
    /// A primitive or `java/lang/String` constant.
    Const {
        #[serde(rename = "type")]
        ty: Type,
    },
    Enum {
        #[serde(rename = "type", with = "phantom_types::internal_name")]
        ty: Type,
        constant: String,
    },
    /// A class literal.
    Class { class: Type },
    Annotation { annotation: AnnotationModel },
    Array {
        component: Type,
        #[serde(default)]
        values: Vec<ElementValue>,
    },
}

impl ElementValue {
    /// Return type of the annotation method that yields this value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            ElementValue::Const { ty } | ElementValue::Enum { ty, .. } => ty.clone(),
            ElementValue::Class { .. } => Type::CLASS,
            ElementValue::Annotation { annotation } => annotation.ty.clone(),
            ElementValue::Array { component, .. } => Type::array_of(component.clone()),
        }
    }
}

/// A library type visible to the archive, with its declared members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryType {
    #[serde(with = "phantom_types::internal_name")]
    pub name: Type,
    #[serde(default)]
    pub interface: bool,
    #[serde(default, with = "phantom_types::internal_name::option")]
    pub superclass: Option<Type>,
    #[serde(default, with = "phantom_types::internal_name::seq")]
    pub interfaces: Vec<Type>,
    #[serde(default)]
    pub fields: Vec<FieldModel>,
    #[serde(default)]
    pub methods: Vec<MethodModel>,
}

impl LibraryType {
    fn declaration(&self) -> Declaration<'_> {
        Declaration {
            name: &self.name,
            interface: self.interface,
            superclass: self.superclass.as_ref(),
            interfaces: &self.interfaces,
        }
    }
}

struct Declaration<'a> {
    name: &'a Type,
    interface: bool,
    superclass: Option<&'a Type>,
    interfaces: &'a [Type],
}

impl ArchiveModel {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RepairError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Known types of the archive and library. Supertypes declared nowhere
    /// are left unknown.
    pub fn hierarchy(&self) -> Result<ClassHierarchy> {
        let declarations: Vec<Declaration<'_>> = self
            .library
            .iter()
            .map(LibraryType::declaration)
            .chain(self.classes.iter().map(ClassModel::declaration))
            .filter(|decl| *decl.name != Type::OBJECT)
            .collect();

        // Interfaces go first so that classes naming them are checked
        // against their kind.
        let mut hierarchy = ClassHierarchy::new();
        for decl in declarations.iter().filter(|decl| decl.interface) {
            hierarchy.add_interface(decl.name.clone(), decl.interfaces.iter().cloned())?;
        }
        for decl in declarations.iter().filter(|decl| !decl.interface) {
            let superclass = decl.superclass.cloned().unwrap_or(Type::OBJECT);
            hierarchy.add_class(decl.name.clone(), superclass, decl.interfaces.iter().cloned())?;
        }
        tracing::debug!(
            classes = self.classes.len(),
            library = self.library.len(),
            known = hierarchy.len(),
            "built class hierarchy"
        );
        Ok(hierarchy)
    }
}
