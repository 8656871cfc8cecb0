use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Error deserializing parameters")]
    Deserialize(#[from] toml::de::Error),

    #[error("Parameter toml does not have the right structure (error in '{0}')")]
    BadToml(String),

    #[error("Element '{path}' not found")]
    NotFound { path: String },

    #[error("Cannot cast parameter '{path}' to {dtype}")]
    BadCast { path: String, dtype: String },

    #[error("Element '{path}' is not a parameter")]
    NotAParameter { path: String },

    #[error("Element '{path}' is not a map")]
    NotAMap { path: String },
}

/// Typed leaf value. In TOML every parameter is a table of the form
/// `{ val = ..., type = "float" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParameterValue {
    #[serde(rename = "bool")]
    Bool { val: bool },
    #[serde(rename = "int")]
    Int { val: i64 },
    #[serde(rename = "float")]
    Float { val: f64 },
    #[serde(rename = "str")]
    String { val: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    path: String,
    value: ParameterValue,
}

impl Parameter {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value_bool(&self) -> Result<bool, Error> {
        if let ParameterValue::Bool { val } = self.value {
            Ok(val)
        } else {
            Err(Error::BadCast {
                path: self.path.clone(),
                dtype: "bool".to_string(),
            })
        }
    }

    pub fn value_int(&self) -> Result<i64, Error> {
        if let ParameterValue::Int { val } = self.value {
            Ok(val)
        } else {
            Err(Error::BadCast {
                path: self.path.clone(),
                dtype: "int".to_string(),
            })
        }
    }

    pub fn value_float(&self) -> Result<f64, Error> {
        if let ParameterValue::Float { val } = self.value {
            Ok(val)
        } else {
            Err(Error::BadCast {
                path: self.path.clone(),
                dtype: "float".to_string(),
            })
        }
    }

    pub fn value_string(&self) -> Result<String, Error> {
        if let ParameterValue::String { val } = &self.value {
            Ok(val.clone())
        } else {
            Err(Error::BadCast {
                path: self.path.clone(),
                dtype: "str".to_string(),
            })
        }
    }
}

/// Nested parameter tree addressed by dotted paths, e.g.
/// `bridge.publish_rate_hz`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    path: String,
    map: BTreeMap<String, ParameterTree>,
}

impl ParameterMap {
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, rel_path: &str) -> Result<&ParameterTree, Error> {
        let mut parts = rel_path.split(".");

        let mut elem = self
            .map
            .get(parts.next().expect("Split cannot return an empty iterator"))
            .ok_or(Error::NotFound {
                path: append_path(&self.path, rel_path),
            })?;

        for part in parts {
            match elem {
                ParameterTree::Node(n) => {
                    elem = n.map.get(part).ok_or(Error::NotFound {
                        path: append_path(&self.path, rel_path),
                    })?;
                }
                ParameterTree::Leaf(_) => {
                    return Err(Error::NotFound {
                        path: append_path(&self.path, rel_path),
                    });
                }
            }
        }

        Ok(elem)
    }

    pub fn get_param(&self, rel_path: &str) -> Result<&Parameter, Error> {
        self.get(rel_path)?.as_param()
    }

    pub fn get_map(&self, rel_path: &str) -> Result<&ParameterMap, Error> {
        self.get(rel_path)?.as_map()
    }

    pub fn iter(&self) -> ParameterMapIter<'_> {
        ParameterMapIter {
            iter: self.map.iter(),
        }
    }
}

#[derive(Default)]
pub struct ParameterMapIter<'a> {
    iter: btree_map::Iter<'a, String, ParameterTree>,
}

impl<'a> Iterator for ParameterMapIter<'a> {
    type Item = (&'a String, &'a ParameterTree);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTree {
    Node(ParameterMap),
    Leaf(Parameter),
}

impl Default for ParameterTree {
    fn default() -> Self {
        ParameterTree::Node(ParameterMap::default())
    }
}

impl ParameterTree {
    fn as_param(&self) -> Result<&Parameter, Error> {
        match self {
            Self::Leaf(p) => Ok(p),
            Self::Node(m) => Err(Error::NotAParameter {
                path: m.path.clone(),
            }),
        }
    }

    fn as_map(&self) -> Result<&ParameterMap, Error> {
        match self {
            Self::Node(m) => Ok(m),
            Self::Leaf(p) => Err(Error::NotAMap {
                path: p.path.clone(),
            }),
        }
    }
}

pub fn parse_string(toml_str: &str) -> Result<ParameterMap, Error> {
    let table = toml::from_str::<Table>(toml_str)?;

    parse_table(table)
}

pub fn parse_table(table: Table) -> Result<ParameterMap, Error> {
    parse_table_recursive(table, "".to_string())
}

fn parse_table_recursive(table: Table, root: String) -> Result<ParameterMap, Error> {
    let mut nodes = BTreeMap::new();

    for (key, val) in table.into_iter() {
        let path = append_path(root.as_str(), key.as_str());
        match val {
            Value::Table(val) => {
                if let Ok(value) = val.clone().try_into::<ParameterValue>() {
                    let param = Parameter { path, value };
                    nodes.insert(key, ParameterTree::Leaf(param));
                } else {
                    nodes.insert(key, ParameterTree::Node(parse_table_recursive(val, path)?));
                }
            }
            _ => {
                return Err(Error::BadToml(root));
            }
        }
    }

    Ok(ParameterMap {
        path: root.clone(),
        map: nodes,
    })
}

fn append_path(root: &str, key: &str) -> String {
    format!("{root}.{key}")
}
