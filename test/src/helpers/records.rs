use opus_shared::{FuncInfoMessage, GenericMessage, KvPair, PayloadType, RawMessage, StartupMessage};

/// Call record ending one tick after it began
pub fn call(func_name: &str, args: &[(&str, &str)], ret_val: i64, begin_time: u64) -> FuncInfoMessage {
    FuncInfoMessage {
        func_name: func_name.to_string(),
        args: args.iter().map(|(key, value)| KvPair::new(*key, *value)).collect(),
        ret_val,
        error_num: 0,
        begin_time,
        end_time: begin_time + 1,
        git_hash: None,
    }
}

pub fn startup(exec_name: &str) -> StartupMessage {
    StartupMessage {
        exec_name: exec_name.to_string(),
        cwd: "/".to_string(),
        cmd_line_args: vec![exec_name.to_string()],
        start_time: 0,
        ppid: 1,
    }
}

pub fn is_disconnect(message: &RawMessage) -> bool {
    message.kind() == Ok(PayloadType::Generic)
        && message
            .decode::<GenericMessage>()
            .map(|generic| generic.is_disconnect())
            .unwrap_or(false)
}
