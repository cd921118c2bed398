//! Shared helpers for integration tests: compile a program and execute the
//! IR it produces with a small interpreter covering the emitted subset.

#![allow(dead_code)]

use std::collections::HashMap;

/// Compile `source`, failing the test with rendered diagnostics on error
pub fn compile_ok(source: &str) -> String {
    match expressive::compile(source) {
        Ok(ir) => ir,
        Err(diagnostics) => panic!(
            "compilation failed:\n{}",
            diagnostics.render("test.exp", source)
        ),
    }
}

/// Compile and run `source`
pub fn run(source: &str) -> Execution {
    IrModule::parse(&compile_ok(source)).run()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Ptr(Pointer),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pointer {
    Slot(String),
    Global(String),
    Null,
}

/// Observable outcome of running `main`
#[derive(Debug, Default)]
pub struct Execution {
    pub output: String,
    /// Blocks entered, in order
    pub blocks: Vec<String>,
    /// Instructions executed, in order
    pub instructions: Vec<String>,
    pub memory: HashMap<String, Value>,
}

impl Execution {
    /// Final value of the variable called `name` (must not be shadowed)
    pub fn variable(&self, name: &str) -> Option<&Value> {
        let prefix = format!("%var.{name}.");
        let mut found = self
            .memory
            .iter()
            .filter(|(slot, _)| slot.starts_with(&prefix));
        let first = found.next().map(|(_, value)| value);
        assert!(found.next().is_none(), "variable '{name}' is ambiguous");
        first
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.variable(name) {
            Some(Value::Int(value)) => *value,
            other => panic!("'{name}' is not an integer: {other:?}"),
        }
    }

    pub fn visited(&self, label: &str) -> bool {
        self.blocks.iter().any(|block| block == label)
    }

    pub fn executed(&self, fragment: &str) -> usize {
        self.instructions
            .iter()
            .filter(|line| line.contains(fragment))
            .count()
    }
}

/// The `main` function of a generated module, split into blocks
pub struct IrModule {
    globals: HashMap<String, Vec<u8>>,
    blocks: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl IrModule {
    pub fn parse(ir: &str) -> Self {
        let mut globals = HashMap::new();
        let mut blocks: HashMap<String, Vec<String>> = HashMap::new();
        let mut order = Vec::new();
        let mut in_function = false;

        for line in ir.lines() {
            if line.starts_with("define ") {
                in_function = true;
                continue;
            }
            if !in_function {
                if line.starts_with('@') {
                    let (name, bytes) = parse_global(line);
                    globals.insert(name, bytes);
                }
                continue;
            }
            if line == "}" {
                in_function = false;
                continue;
            }
            if let Some(label) = line.strip_suffix(':') {
                assert!(!line.starts_with(' '), "indented label: {line}");
                let previous = blocks.insert(label.to_string(), Vec::new());
                assert!(previous.is_none(), "duplicate label {label}");
                order.push(label.to_string());
                continue;
            }
            let current = order.last().expect("instruction outside a block");
            blocks
                .get_mut(current)
                .unwrap()
                .push(line.trim().to_string());
        }

        assert!(!order.is_empty(), "function has no blocks");
        Self {
            globals,
            blocks,
            order,
        }
    }

    /// Labels in emission order
    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn block(&self, label: &str) -> &[String] {
        self.blocks
            .get(label)
            .unwrap_or_else(|| panic!("no block {label}"))
    }

    pub fn terminator(&self, label: &str) -> &str {
        self.block(label)
            .last()
            .unwrap_or_else(|| panic!("empty block {label}"))
    }

    /// Branch targets of a block
    pub fn successors(&self, label: &str) -> Vec<String> {
        let terminator = self.terminator(label);
        if terminator.starts_with("ret ") {
            return Vec::new();
        }
        assert!(terminator.starts_with("br "), "{label} ends in {terminator}");
        terminator
            .split("label %")
            .skip(1)
            .map(|target| target.trim_end_matches(", ").trim().to_string())
            .collect()
    }

    /// Whether `to` is reachable from `from` without entering `avoiding`
    pub fn reaches_avoiding(&self, from: &str, to: &str, avoiding: &str) -> bool {
        let mut stack = vec![from.to_string()];
        let mut seen = Vec::new();
        while let Some(label) = stack.pop() {
            if label == to {
                return true;
            }
            if label == avoiding || seen.contains(&label) {
                continue;
            }
            stack.extend(self.successors(&label));
            seen.push(label);
        }
        false
    }

    pub fn run(&self) -> Execution {
        let mut execution = Execution::default();
        let mut registers: HashMap<String, Value> = HashMap::new();
        let mut previous: Option<String> = None;
        let mut label = self.order[0].clone();
        let mut steps = 0usize;

        loop {
            execution.blocks.push(label.clone());
            let mut next = None;

            for line in self.block(&label) {
                steps += 1;
                assert!(steps < 1_000_000, "step limit exceeded");
                execution.instructions.push(line.clone());

                if let Some(rest) = line.strip_prefix("br ") {
                    next = Some(self.branch(rest, &registers));
                    break;
                }
                if line.starts_with("ret ") {
                    return execution;
                }

                let (result, operation) = match line.split_once(" = ") {
                    Some((result, operation)) if result.starts_with('%') => {
                        (Some(result), operation)
                    }
                    _ => (None, line.as_str()),
                };
                let value = self.execute(
                    result,
                    operation,
                    &registers,
                    previous.as_deref(),
                    &mut execution,
                );
                if let (Some(result), Some(value)) = (result, value) {
                    registers.insert(result.to_string(), value);
                }
            }

            previous = Some(label.clone());
            label = next.unwrap_or_else(|| panic!("block {label} has no terminator"));
        }
    }

    fn branch(&self, rest: &str, registers: &HashMap<String, Value>) -> String {
        if let Some(target) = rest.strip_prefix("label %") {
            return target.to_string();
        }
        // i1 %c, label %a, label %b
        let parts: Vec<&str> = rest.split(", ").collect();
        let condition = self.operand(parts[0].trim_start_matches("i1 "), "i1", registers);
        let then = parts[1].trim_start_matches("label %");
        let otherwise = parts[2].trim_start_matches("label %");
        if as_int(&condition) != 0 {
            then.to_string()
        } else {
            otherwise.to_string()
        }
    }

    fn execute(
        &self,
        result: Option<&str>,
        operation: &str,
        registers: &HashMap<String, Value>,
        previous: Option<&str>,
        execution: &mut Execution,
    ) -> Option<Value> {
        let (opcode, rest) = operation.split_once(' ').unwrap_or((operation, ""));
        match opcode {
            "alloca" => Some(Value::Ptr(Pointer::Slot(result?.to_string()))),

            "load" => {
                let (ty, rest) = rest.split_once(", ptr ").unwrap();
                let (address, _) = rest.split_once(", ").unwrap();
                let slot = self.slot(address, registers);
                let value = execution
                    .memory
                    .get(&slot)
                    .cloned()
                    .unwrap_or_else(|| panic!("load {ty} from unwritten slot {slot}"));
                Some(value)
            }

            "store" => {
                let (typed, rest) = rest.split_once(", ptr ").unwrap();
                let (address, _) = rest.split_once(", ").unwrap();
                let (ty, value) = typed.split_once(' ').unwrap();
                let value = self.operand(value, ty, registers);
                let slot = self.slot(address, registers);
                execution.memory.insert(slot, value);
                None
            }

            "add" | "sub" | "mul" | "sdiv" | "srem" | "xor" => {
                let (ty, a, b) = binary_operands(rest);
                let a = as_int(&self.operand(a, ty, registers));
                let b = as_int(&self.operand(b, ty, registers));
                let value = match opcode {
                    "add" => a.wrapping_add(b),
                    "sub" => a.wrapping_sub(b),
                    "mul" => a.wrapping_mul(b),
                    "sdiv" => a.wrapping_div(b),
                    "srem" => a.wrapping_rem(b),
                    _ => a ^ b,
                };
                Some(Value::Int(wrap(ty, value)))
            }

            "fadd" | "fsub" | "fmul" | "fdiv" => {
                let (ty, a, b) = binary_operands(rest);
                let a = as_float(&self.operand(a, ty, registers));
                let b = as_float(&self.operand(b, ty, registers));
                let value = match opcode {
                    "fadd" => a + b,
                    "fsub" => a - b,
                    "fmul" => a * b,
                    _ => a / b,
                };
                Some(Value::Float(value))
            }

            "fneg" => {
                let (ty, a) = rest.split_once(' ').unwrap();
                Some(Value::Float(-as_float(&self.operand(a, ty, registers))))
            }

            "icmp" | "fcmp" => {
                let (condition, rest) = rest.split_once(' ').unwrap();
                let (ty, a, b) = binary_operands(rest);
                let a = self.operand(a, ty, registers);
                let b = self.operand(b, ty, registers);
                let ordering = if opcode == "icmp" {
                    as_int(&a).partial_cmp(&as_int(&b))
                } else {
                    as_float(&a).partial_cmp(&as_float(&b))
                }
                .unwrap();
                let holds = match condition.trim_start_matches(['s', 'u', 'o']) {
                    "eq" => ordering.is_eq(),
                    "ne" => ordering.is_ne(),
                    "lt" => ordering.is_lt(),
                    "le" => ordering.is_le(),
                    "gt" => ordering.is_gt(),
                    "ge" => ordering.is_ge(),
                    other => panic!("unknown condition {other}"),
                };
                Some(Value::Int(holds as i64))
            }

            "phi" => {
                let (ty, incoming) = rest.split_once(' ').unwrap();
                let previous = previous.expect("phi in entry block");
                for pair in incoming.split("], ") {
                    let pair = pair.trim_start_matches('[').trim_end_matches(']');
                    let (value, label) = pair.split_once(", %").unwrap();
                    if label == previous {
                        return Some(self.operand(value, ty, registers));
                    }
                }
                panic!("phi has no entry for predecessor {previous}: {incoming}");
            }

            "getelementptr" => {
                let (_, rest) = rest.split_once(", ptr ").unwrap();
                let (base, _) = rest.split_once(", ").unwrap();
                Some(self.operand(base, "ptr", registers))
            }

            "zext" | "sext" => {
                let (source, _) = rest.split_once(" to ").unwrap();
                let (ty, value) = source.split_once(' ').unwrap();
                Some(self.operand(value, ty, registers))
            }

            "call" => {
                let start = rest.find("@printf(").expect("only printf is called") + "@printf(".len();
                let args: Vec<Value> = rest[start..rest.len() - 1]
                    .split(", ")
                    .map(|arg| {
                        let (ty, value) = arg.split_once(' ').unwrap();
                        self.operand(value, ty, registers)
                    })
                    .collect();
                let text = self.printf(&args);
                execution.output.push_str(&text);
                result.map(|_| Value::Int(text.len() as i64))
            }

            other => panic!("unsupported instruction {other}: {operation}"),
        }
    }

    fn operand(&self, text: &str, ty: &str, registers: &HashMap<String, Value>) -> Value {
        if text.starts_with('%') {
            return registers
                .get(text)
                .cloned()
                .unwrap_or_else(|| panic!("undefined register {text}"));
        }
        if text.starts_with('@') {
            return Value::Ptr(Pointer::Global(text.to_string()));
        }
        match text {
            "true" => return Value::Int(1),
            "false" => return Value::Int(0),
            "null" => return Value::Ptr(Pointer::Null),
            _ => {}
        }
        if ty == "double" {
            return match text.strip_prefix("0x") {
                Some(bits) => Value::Float(f64::from_bits(u64::from_str_radix(bits, 16).unwrap())),
                None => Value::Float(text.parse().unwrap()),
            };
        }
        Value::Int(text.parse().unwrap_or_else(|_| panic!("bad constant {text}")))
    }

    fn slot(&self, address: &str, registers: &HashMap<String, Value>) -> String {
        match self.operand(address, "ptr", registers) {
            Value::Ptr(Pointer::Slot(slot)) => slot,
            other => panic!("{address} is not a stack slot: {other:?}"),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Ptr(Pointer::Global(name)) => {
                let bytes = &self.globals[name];
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
            Value::Ptr(Pointer::Null) => "(null)".to_string(),
            other => panic!("not a string: {other:?}"),
        }
    }

    /// Enough of printf for %d %i %c %f %s and %%
    fn printf(&self, args: &[Value]) -> String {
        let format = self.string(&args[0]);
        let mut rest = args[1..].iter();
        let mut out = String::new();
        let mut chars = format.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let mut precision = None;
            let mut conversion = chars.next().expect("dangling %");
            if conversion == '.' {
                let mut digits = String::new();
                for d in chars.by_ref() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                    } else {
                        conversion = d;
                        break;
                    }
                }
                precision = Some(digits.parse::<usize>().unwrap());
            }
            match conversion {
                '%' => out.push('%'),
                'd' | 'i' => out.push_str(&as_int(rest.next().unwrap()).to_string()),
                'c' => out.push(as_int(rest.next().unwrap()) as u8 as char),
                'f' => {
                    let value = as_float(rest.next().unwrap());
                    out.push_str(&format!("{:.*}", precision.unwrap_or(6), value));
                }
                's' => out.push_str(&self.string(rest.next().unwrap())),
                other => panic!("unsupported conversion %{other}"),
            }
        }
        out
    }
}

fn parse_global(line: &str) -> (String, Vec<u8>) {
    let (name, rest) = line.split_once(" = ").unwrap();
    let start = rest.find("c\"").unwrap() + 2;
    let end = rest.rfind('"').unwrap();
    let encoded = rest[start..end].as_bytes();
    let mut bytes = Vec::new();
    let mut i = 0;
    while i < encoded.len() {
        if encoded[i] == b'\\' {
            let hex = std::str::from_utf8(&encoded[i + 1..i + 3]).unwrap();
            bytes.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            bytes.push(encoded[i]);
            i += 1;
        }
    }
    (name.to_string(), bytes)
}

/// `T a, b` into its parts
fn binary_operands(rest: &str) -> (&str, &str, &str) {
    let (ty, operands) = rest.split_once(' ').unwrap();
    let (a, b) = operands.split_once(", ").unwrap();
    (ty, a, b)
}

fn wrap(ty: &str, value: i64) -> i64 {
    match ty {
        "i1" => value & 1,
        "i8" => value as i8 as i64,
        "i32" => value as i32 as i64,
        _ => value,
    }
}

fn as_int(value: &Value) -> i64 {
    match value {
        Value::Int(value) => *value,
        other => panic!("expected an integer, found {other:?}"),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Float(value) => *value,
        other => panic!("expected a float, found {other:?}"),
    }
}
