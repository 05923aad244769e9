use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::NodeKind;

/// Separator used by the string encoding of [`NodeId`].
///
/// Object names containing it are rejected when metadata enters the store, so
/// every encoded id splits back into exactly the parts it was built from.
pub const NODE_ID_SEPARATOR: char = '|';

/// Object group synthesized under a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    Tables,
    Views,
    Procedures,
    Functions,
    Triggers,
}

impl FolderKind {
    /// Display order of the folders under a schema.
    pub const ALL: [FolderKind; 5] = [
        FolderKind::Tables,
        FolderKind::Views,
        FolderKind::Procedures,
        FolderKind::Functions,
        FolderKind::Triggers,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FolderKind::Tables => "Tables",
            FolderKind::Views => "Views",
            FolderKind::Procedures => "Stored Procedures",
            FolderKind::Functions => "Functions",
            FolderKind::Triggers => "Triggers",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            FolderKind::Tables => "tables",
            FolderKind::Views => "views",
            FolderKind::Procedures => "procedures",
            FolderKind::Functions => "functions",
            FolderKind::Triggers => "triggers",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Typed identity of a node in the schema tree.
///
/// The id is derived from the object's path (schema, optional table, name), so
/// the same database object maps to the same id across reloads. The expanded
/// set and the metadata cache both rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Schema {
        name: String,
    },
    Folder {
        schema: String,
        kind: FolderKind,
    },
    Table {
        schema: String,
        name: String,
    },
    View {
        schema: String,
        name: String,
    },
    Function {
        schema: String,
        name: String,
    },
    Procedure {
        schema: String,
        name: String,
    },
    Trigger {
        schema: String,
        table: String,
        name: String,
    },
    Column {
        schema: String,
        table: String,
        name: String,
    },
}

impl NodeId {
    pub fn schema(name: impl Into<String>) -> Self {
        Self::Schema { name: name.into() }
    }

    pub fn folder(schema: impl Into<String>, kind: FolderKind) -> Self {
        Self::Folder {
            schema: schema.into(),
            kind,
        }
    }

    pub fn table(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Table {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn view(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::View {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn function(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Function {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn procedure(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Procedure {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn trigger(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Trigger {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Column {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Schema { .. } => NodeKind::Schema,
            Self::Folder { .. } => NodeKind::Folder,
            Self::Table { .. } => NodeKind::Table,
            Self::View { .. } => NodeKind::View,
            Self::Function { .. } => NodeKind::Function,
            Self::Procedure { .. } => NodeKind::Procedure,
            Self::Trigger { .. } => NodeKind::Trigger,
            Self::Column { .. } => NodeKind::Column,
        }
    }

    /// Name of the schema this node belongs to.
    pub fn schema_name(&self) -> &str {
        match self {
            Self::Schema { name } => name,
            Self::Folder { schema, .. }
            | Self::Table { schema, .. }
            | Self::View { schema, .. }
            | Self::Function { schema, .. }
            | Self::Procedure { schema, .. }
            | Self::Trigger { schema, .. }
            | Self::Column { schema, .. } => schema,
        }
    }

    /// Name of the owning table, for tables themselves and their dependents.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::Table { name, .. } => Some(name),
            Self::Trigger { table, .. } | Self::Column { table, .. } => Some(table),
            _ => None,
        }
    }
}

const P_SCHEMA: &str = "S";
const P_FOLDER: &str = "F";
const P_TABLE: &str = "T";
const P_VIEW: &str = "V";
const P_FUNCTION: &str = "FN";
const P_PROCEDURE: &str = "PR";
const P_TRIGGER: &str = "TR";
const P_COLUMN: &str = "CL";

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { name } => write!(f, "{}|{}", P_SCHEMA, name),
            Self::Folder { schema, kind } => {
                write!(f, "{}|{}|{}", P_FOLDER, schema, kind.tag())
            }
            Self::Table { schema, name } => write!(f, "{}|{}|{}", P_TABLE, schema, name),
            Self::View { schema, name } => write!(f, "{}|{}|{}", P_VIEW, schema, name),
            Self::Function { schema, name } => write!(f, "{}|{}|{}", P_FUNCTION, schema, name),
            Self::Procedure { schema, name } => {
                write!(f, "{}|{}|{}", P_PROCEDURE, schema, name)
            }
            Self::Trigger {
                schema,
                table,
                name,
            } => write!(f, "{}|{}|{}|{}", P_TRIGGER, schema, table, name),
            Self::Column {
                schema,
                table,
                name,
            } => write!(f, "{}|{}|{}|{}", P_COLUMN, schema, table, name),
        }
    }
}

/// Error returned when parsing a [`NodeId`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeIdError {
    pub input: String,
}

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node id: {:?}", self.input)
    }
}

impl std::error::Error for ParseNodeIdError {}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNodeIdError {
            input: s.to_string(),
        };

        let parts: Vec<&str> = s.split(NODE_ID_SEPARATOR).collect();
        let part = |index: usize| -> Result<String, ParseNodeIdError> {
            parts
                .get(index)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
                .ok_or_else(err)
        };

        let expected_len = match parts[0] {
            P_SCHEMA => 2,
            P_FOLDER | P_TABLE | P_VIEW | P_FUNCTION | P_PROCEDURE => 3,
            P_TRIGGER | P_COLUMN => 4,
            _ => return Err(err()),
        };

        if parts.len() != expected_len {
            return Err(err());
        }

        match parts[0] {
            P_SCHEMA => Ok(Self::Schema { name: part(1)? }),
            P_FOLDER => {
                let kind = FolderKind::from_tag(parts[2]).ok_or_else(err)?;
                Ok(Self::Folder {
                    schema: part(1)?,
                    kind,
                })
            }
            P_TABLE => Ok(Self::Table {
                schema: part(1)?,
                name: part(2)?,
            }),
            P_VIEW => Ok(Self::View {
                schema: part(1)?,
                name: part(2)?,
            }),
            P_FUNCTION => Ok(Self::Function {
                schema: part(1)?,
                name: part(2)?,
            }),
            P_PROCEDURE => Ok(Self::Procedure {
                schema: part(1)?,
                name: part(2)?,
            }),
            P_TRIGGER => Ok(Self::Trigger {
                schema: part(1)?,
                table: part(2)?,
                name: part(3)?,
            }),
            P_COLUMN => Ok(Self::Column {
                schema: part(1)?,
                table: part(2)?,
                name: part(3)?,
            }),
            _ => Err(err()),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
