//! Host boundary
//!
//! Exposes the context to a dynamically typed host (a scripting runtime, an
//! RPC layer) as named operations over [`HostValue`] arguments. Argument
//! count and types are checked here, before any hardware is touched, and
//! mismatches fail with `InvalidArgument`.
//!
//! | Operation | Arguments | Result |
//! |-----------|-----------|--------|
//! | `start` | - | `Undefined` |
//! | `setInput` | pin | `Int(0)` |
//! | `setOutput` | pin | `Int(0)` |
//! | `read` | pin | `Int(level)` |
//! | `write` | pin, level | `Int(0)` |
//! | `spiDataMode` | mode 0-3 | `Int(0)` |
//! | `spiBitOrder` | order 0-1 | `Int(0)` |
//! | `spiClockSpeedDivider` | divider 0-65535 | `Int(0)` |
//! | `spiTransfer` | buffer, length, aux pins?, chip-select pin? | `Buffer` or `Undefined` |
//!
//! Optional arguments may be omitted or passed as `Undefined`. Each auxiliary
//! pin is an object `{pin, value}` or a pair `[pin, value]`. On platforms
//! without the hardware every operation returns `Undefined`.

use log::trace;

use crate::error::{Error, Result};
use crate::gpio::{Level, Pin};
use crate::lifecycle::Rpio;
use crate::spi::{AuxPin, BitOrder, DataMode, Transfer};

/// Value crossing the host boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Undefined,
    Int(i64),
    Buffer(Vec<u8>),
    List(Vec<HostValue>),
    Object(Vec<(String, HostValue)>),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Int(_) => "integer",
            HostValue::Buffer(_) => "buffer",
            HostValue::List(_) => "list",
            HostValue::Object(_) => "object",
        }
    }

    fn field(&self, name: &str) -> Option<&HostValue> {
        match self {
            HostValue::Object(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Operations exported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    SetInput,
    SetOutput,
    Read,
    Write,
    SpiDataMode,
    SpiBitOrder,
    SpiClockSpeedDivider,
    SpiTransfer,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Start,
        Operation::SetInput,
        Operation::SetOutput,
        Operation::Read,
        Operation::Write,
        Operation::SpiDataMode,
        Operation::SpiBitOrder,
        Operation::SpiClockSpeedDivider,
        Operation::SpiTransfer,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::SetInput => "setInput",
            Operation::SetOutput => "setOutput",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::SpiDataMode => "spiDataMode",
            Operation::SpiBitOrder => "spiBitOrder",
            Operation::SpiClockSpeedDivider => "spiClockSpeedDivider",
            Operation::SpiTransfer => "spiTransfer",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| Error::invalid(format!("unknown operation: {}", name)))
    }

    /// Accepted argument counts
    const fn arity(self) -> (usize, usize) {
        match self {
            Operation::Start => (0, 0),
            Operation::Write => (2, 2),
            Operation::SpiTransfer => (2, 4),
            _ => (1, 1),
        }
    }
}

/// Host-facing wrapper around a context
#[derive(Debug)]
pub struct Binding {
    rpio: Rpio,
}

impl Binding {
    pub fn new(rpio: Rpio) -> Self {
        Self { rpio }
    }

    pub fn rpio(&self) -> &Rpio {
        &self.rpio
    }

    /// Invoke an operation by its exported name
    pub fn call(&mut self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        let op = Operation::from_name(name)?;
        if !self.rpio.is_hardware() {
            return Ok(HostValue::Undefined);
        }

        let (min, max) = op.arity();
        if args.len() < min || args.len() > max {
            return Err(Error::invalid(format!(
                "{}: incorrect number of arguments: {}",
                op.name(),
                args.len()
            )));
        }
        trace!("host call {}({} args)", op.name(), args.len());

        match op {
            Operation::Start => {
                self.rpio.start()?;
                Ok(HostValue::Undefined)
            }
            Operation::SetInput => {
                self.rpio.set_input(pin_arg(op, &args[0])?)?;
                Ok(HostValue::Int(0))
            }
            Operation::SetOutput => {
                self.rpio.set_output(pin_arg(op, &args[0])?)?;
                Ok(HostValue::Int(0))
            }
            Operation::Read => {
                let level = self.rpio.read(pin_arg(op, &args[0])?)?;
                Ok(HostValue::Int(level.as_int()))
            }
            Operation::Write => {
                let pin = pin_arg(op, &args[0])?;
                let level = Level::from_int(int_arg(op, &args[1])?);
                self.rpio.write(pin, level)?;
                Ok(HostValue::Int(0))
            }
            Operation::SpiDataMode => {
                let mode = ranged_arg(op, &args[0], 0, 3)? as u8;
                self.rpio.spi_set_data_mode(DataMode::try_from(mode)?)?;
                Ok(HostValue::Int(0))
            }
            Operation::SpiBitOrder => {
                let order = ranged_arg(op, &args[0], 0, 1)? as u8;
                self.rpio.spi_set_bit_order(BitOrder::try_from(order)?)?;
                Ok(HostValue::Int(0))
            }
            Operation::SpiClockSpeedDivider => {
                let divider = ranged_arg(op, &args[0], 0, i64::from(u16::MAX))? as u16;
                self.rpio.spi_set_clock_divider(divider)?;
                Ok(HostValue::Int(0))
            }
            Operation::SpiTransfer => self.spi_transfer(op, args),
        }
    }

    fn spi_transfer(&mut self, op: Operation, args: &[HostValue]) -> Result<HostValue> {
        let HostValue::Buffer(write) = &args[0] else {
            return Err(type_error(op, 0, "buffer", &args[0]));
        };
        let length = ranged_arg(op, &args[1], 0, i64::from(u32::MAX))? as usize;

        let aux_pins = match args.get(2) {
            None | Some(HostValue::Undefined) => Vec::new(),
            Some(HostValue::List(entries)) => entries
                .iter()
                .map(|entry| aux_entry(op, entry))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => return Err(type_error(op, 2, "list", other)),
        };

        let chip_select = match args.get(3) {
            None | Some(HostValue::Undefined) => None,
            Some(value) => Some(pin_arg(op, value)?),
        };

        let mut transfer = Transfer::new(write, length).aux_pins(&aux_pins);
        if let Some(pin) = chip_select {
            transfer = transfer.chip_select(pin);
        }

        let rx = self.rpio.spi_transfer(&transfer)?;
        if rx.is_empty() {
            Ok(HostValue::Undefined)
        } else {
            Ok(HostValue::Buffer(rx))
        }
    }
}

fn type_error(op: Operation, index: usize, expected: &str, got: &HostValue) -> Error {
    Error::invalid(format!(
        "{}: argument {} must be {}, got {}",
        op.name(),
        index,
        expected,
        got.type_name()
    ))
}

fn int_arg(op: Operation, value: &HostValue) -> Result<i64> {
    match value {
        HostValue::Int(v) => Ok(*v),
        other => Err(Error::invalid(format!(
            "{}: expected integer, got {}",
            op.name(),
            other.type_name()
        ))),
    }
}

fn ranged_arg(op: Operation, value: &HostValue, min: i64, max: i64) -> Result<i64> {
    let v = int_arg(op, value)?;
    if v < min || v > max {
        return Err(Error::invalid(format!(
            "{}: {} is outside {}..={}",
            op.name(),
            v,
            min,
            max
        )));
    }
    Ok(v)
}

fn pin_arg(op: Operation, value: &HostValue) -> Result<Pin> {
    Ok(ranged_arg(op, value, 0, i64::from(Pin::MAX))? as Pin)
}

fn aux_entry(op: Operation, entry: &HostValue) -> Result<AuxPin> {
    let (pin, level) = match entry {
        HostValue::Object(_) => match (entry.field("pin"), entry.field("value")) {
            (Some(pin), Some(level)) => (pin, level),
            _ => {
                return Err(Error::invalid(format!(
                    "{}: auxiliary pin objects need `pin` and `value`",
                    op.name()
                )))
            }
        },
        HostValue::List(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
        other => {
            return Err(Error::invalid(format!(
                "{}: auxiliary pin must be {{pin, value}} or [pin, value], got {}",
                op.name(),
                other.type_name()
            )))
        }
    };
    Ok(AuxPin::new(
        pin_arg(op, pin)?,
        Level::from_int(int_arg(op, level)?),
    ))
}
