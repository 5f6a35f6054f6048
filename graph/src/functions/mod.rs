use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use log::info;
use serde::Deserialize;
use serde_yaml::Value;

use opus_shared::FuncInfoMessage;

use crate::error::FunctionTableError;

/// Default table for POSIX interposition
pub const POSIX_TABLE: &str = include_str!("posix.yaml");

/// Argument every descriptor-bound function names its descriptor with
pub const FILEDES: &str = "filedes";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// New local for the descriptor
    Open,
    /// I/O event spliced into the descriptor's chain
    Event,
    /// Meta record on the process
    Process,
    None,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Open => "open_action",
            Action::Event => "event_action",
            Action::Process => "process_action",
            Action::None => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open_action" => Some(Action::Open),
            "event_action" => Some(Action::Event),
            "process_action" => Some(Action::Process),
            "none" => Some(Action::None),
            _ => None,
        }
    }
}

/// Where a handler argument is read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgBinding {
    MsgArg(String),
    MsgField(String),
    RetVal,
    Const(String),
}

impl ArgBinding {
    pub fn resolve(&self, msg: &FuncInfoMessage) -> Option<String> {
        match self {
            ArgBinding::MsgArg(key) => msg.arg(key).map(str::to_string),
            ArgBinding::MsgField(name) => msg.field(name),
            ArgBinding::RetVal => Some(msg.ret_val.to_string()),
            ArgBinding::Const(value) => Some(value.clone()),
        }
    }

    fn parse(parts: &[Value]) -> Result<Self, String> {
        let words = parts
            .iter()
            .map(scalar_to_string)
            .collect::<Result<Vec<_>, _>>()?;

        match words.as_slice() {
            [kind] if kind == "ret_val" => Ok(ArgBinding::RetVal),
            [kind, value] if kind == "msg_arg" => Ok(ArgBinding::MsgArg(value.clone())),
            [kind, value] if kind == "msg_field" => Ok(ArgBinding::MsgField(value.clone())),
            [kind, value] if kind == "const" => Ok(ArgBinding::Const(value.clone())),
            [] => Err("empty binding".to_string()),
            other => Err(format!("unrecognised binding {:?}", other)),
        }
    }
}

fn scalar_to_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(format!("binding parts must be scalars, got {:?}", other)),
    }
}

/// Handler arguments resolved against one message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundArgs {
    func: String,
    values: BTreeMap<String, Option<String>>,
}

impl BoundArgs {
    pub fn func(&self) -> &str {
        &self.func
    }

    pub fn get(&self, arg: &str) -> Option<&str> {
        self.values.get(arg).and_then(|value| value.as_deref())
    }

    pub fn require(&self, arg: &str) -> Result<&str, FunctionTableError> {
        self.get(arg).ok_or_else(|| FunctionTableError::MissingValue {
            func: self.func.clone(),
            arg: arg.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSpec {
    pub action: Action,
    pub arg_map: BTreeMap<String, ArgBinding>,
}

impl FunctionSpec {
    pub fn bind(&self, msg: &FuncInfoMessage) -> BoundArgs {
        let values = self
            .arg_map
            .iter()
            .map(|(arg, binding)| (arg.clone(), binding.resolve(msg)))
            .collect();
        BoundArgs {
            func: msg.func_name.clone(),
            values,
        }
    }
}

#[derive(Deserialize)]
struct RawSpec {
    action: String,
    #[serde(default)]
    arg_map: BTreeMap<String, Vec<Value>>,
}

/// Function name to action table, built once and read-only afterwards
#[derive(Clone, Debug, Default)]
pub struct FunctionTable {
    specs: HashMap<String, FunctionSpec>,
}

impl FunctionTable {
    pub fn posix() -> Result<Self, FunctionTableError> {
        Self::from_yaml(POSIX_TABLE)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FunctionTableError> {
        let raw: BTreeMap<String, RawSpec> =
            serde_yaml::from_str(yaml).map_err(|err| FunctionTableError::Parse {
                reason: err.to_string(),
            })?;

        let mut specs = HashMap::with_capacity(raw.len());
        for (func, spec) in raw {
            let action =
                Action::from_name(&spec.action).ok_or_else(|| FunctionTableError::UnknownAction {
                    func: func.clone(),
                    action: spec.action.clone(),
                })?;

            let mut arg_map = BTreeMap::new();
            for (arg, parts) in spec.arg_map {
                let binding =
                    ArgBinding::parse(&parts).map_err(|reason| FunctionTableError::InvalidBinding {
                        func: func.clone(),
                        arg: arg.clone(),
                        reason,
                    })?;
                arg_map.insert(arg, binding);
            }
            specs.insert(func, FunctionSpec { action, arg_map });
        }

        info!("Loaded function table with {} entries", specs.len());
        Ok(Self { specs })
    }

    pub fn from_file(path: &Path) -> Result<Self, FunctionTableError> {
        let yaml = fs::read_to_string(path).map_err(|err| FunctionTableError::Read {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn contains(&self, func: &str) -> bool {
        self.specs.contains_key(func)
    }

    pub fn spec(&self, func: &str) -> Result<&FunctionSpec, FunctionTableError> {
        self.specs
            .get(func)
            .ok_or_else(|| FunctionTableError::MissingMapping {
                func: func.to_string(),
            })
    }

    pub fn bind(&self, msg: &FuncInfoMessage) -> Result<(Action, BoundArgs), FunctionTableError> {
        let spec = self.spec(&msg.func_name)?;
        Ok((spec.action, spec.bind(msg)))
    }

    /// Descriptor `msg` operates on, via its `filedes` binding
    pub fn descriptor(&self, msg: &FuncInfoMessage) -> Result<String, FunctionTableError> {
        let spec = self.spec(&msg.func_name)?;
        let binding = spec
            .arg_map
            .get(FILEDES)
            .ok_or_else(|| FunctionTableError::NoDescriptor {
                func: msg.func_name.clone(),
            })?;
        binding
            .resolve(msg)
            .ok_or_else(|| FunctionTableError::MissingValue {
                func: msg.func_name.clone(),
                arg: FILEDES.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use opus_shared::KvPair;

    use super::*;

    fn call(func_name: &str, args: &[(&str, &str)], ret_val: i64) -> FuncInfoMessage {
        FuncInfoMessage {
            func_name: func_name.to_string(),
            args: args.iter().map(|(k, v)| KvPair::new(*k, *v)).collect(),
            ret_val,
            error_num: 0,
            begin_time: 1,
            end_time: 2,
            git_hash: None,
        }
    }

    #[test]
    fn posix_table_loads() {
        let table = FunctionTable::posix().expect("posix table");
        assert!(table.contains("open"));
        assert!(table.contains("read"));
        assert_eq!(table.spec("fork").expect("fork").action, Action::None);
        assert_eq!(table.spec("chdir").expect("chdir").action, Action::Process);
    }

    #[test]
    fn descriptor_follows_filedes_binding() {
        let table = FunctionTable::posix().expect("posix table");
        assert_eq!(
            table.descriptor(&call("open", &[("pathname", "/etc/hosts")], 5)),
            Ok("5".to_string())
        );
        assert_eq!(table.descriptor(&call("read", &[("fd", "5")], 12)), Ok("5".to_string()));
        assert_eq!(
            table.descriptor(&call("read", &[], 12)),
            Err(FunctionTableError::MissingValue {
                func: "read".to_string(),
                arg: FILEDES.to_string()
            })
        );
        assert_eq!(
            table.descriptor(&call("chdir", &[("path", "/")], 0)),
            Err(FunctionTableError::NoDescriptor {
                func: "chdir".to_string()
            })
        );
    }

    #[test]
    fn unknown_function_has_no_mapping() {
        let table = FunctionTable::posix().expect("posix table");
        assert_eq!(
            table.bind(&call("ioctl", &[], 0)).map(|(action, _)| action),
            Err(FunctionTableError::MissingMapping {
                func: "ioctl".to_string()
            })
        );
    }

    #[test]
    fn bindings_resolve_every_kind() {
        let yaml = r#"
probe:
  action: process_action
  arg_map:
    a: [msg_arg, name]
    f: [msg_field, end_time]
    r: [ret_val]
    c: [const, 17]
"#;
        let table = FunctionTable::from_yaml(yaml).expect("table");
        let (action, args) = table.bind(&call("probe", &[("name", "HOME")], -1)).expect("bind");

        assert_eq!(action, Action::Process);
        assert_eq!(args.get("a"), Some("HOME"));
        assert_eq!(args.get("f"), Some("2"));
        assert_eq!(args.get("r"), Some("-1"));
        assert_eq!(args.get("c"), Some("17"));
        assert!(args.require("missing").is_err());
    }

    #[test]
    fn bad_tables_are_rejected() {
        assert!(matches!(
            FunctionTable::from_yaml("open: {action: teleport}"),
            Err(FunctionTableError::UnknownAction { .. })
        ));
        assert!(matches!(
            FunctionTable::from_yaml("open: {action: open_action, arg_map: {filedes: [sideways, 1]}}"),
            Err(FunctionTableError::InvalidBinding { .. })
        ));
        assert!(matches!(
            FunctionTable::from_yaml("- not a map"),
            Err(FunctionTableError::Parse { .. })
        ));
    }
}
