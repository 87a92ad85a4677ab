//! Recording driver test double
//!
//! Keeps a register mirror and an ordered log of every call. Exchanges loop
//! back by default. Clones share state, so a test can keep one handle and give
//! the other to an [`Rpio`](crate::Rpio).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::gpio::{Level, Pin, PinFunction};
use crate::spi::{BitOrder, ChipSelect, DataMode, SpiConfig};

use super::PeripheralDriver;

/// One call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Map,
    Unmap,
    Fsel(Pin, PinFunction),
    Write(Pin, Level),
    ChipSelect(ChipSelect),
    DataMode(DataMode),
    BitOrder(BitOrder),
    ClockDivider(u16),
    Begin,
    /// Bytes handed to the exchange
    Exchange(Vec<u8>),
    End,
}

#[derive(Debug)]
struct MockState {
    mapped: bool,
    fail_map: bool,
    fail_exchange: bool,
    response: Option<Vec<u8>>,
    functions: HashMap<Pin, PinFunction>,
    outputs: HashMap<Pin, Level>,
    inputs: HashMap<Pin, Level>,
    chip_select: ChipSelect,
    spi: SpiConfig,
    bytes_clocked: usize,
    divider_at_exchanges: Vec<u16>,
    events: Vec<Event>,
}

/// Shared-state mock of the peripheral driver
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Mock of a hardware-capable platform
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                mapped: false,
                fail_map: false,
                fail_exchange: false,
                response: None,
                functions: HashMap::new(),
                outputs: HashMap::new(),
                inputs: HashMap::new(),
                chip_select: ChipSelect::Cs0,
                spi: SpiConfig::default(),
                bytes_clocked: 0,
                divider_at_exchanges: Vec::new(),
                events: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test must not hide the log from the next assertion
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: Event) {
        self.state().events.push(event);
    }

    /// Make `map` fail
    pub fn fail_map(&self, fail: bool) {
        self.state().fail_map = fail;
    }

    /// Make every exchange report a fault
    pub fn fail_exchange(&self, fail: bool) {
        self.state().fail_exchange = fail;
    }

    /// Bytes returned by the next exchanges instead of loopback
    pub fn respond_with(&self, bytes: Vec<u8>) {
        self.state().response = Some(bytes);
    }

    /// Level seen on a pin while it is an input
    pub fn set_input_level(&self, pin: Pin, level: Level) {
        self.state().inputs.insert(pin, level);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn is_mapped(&self) -> bool {
        self.state().mapped
    }

    /// Value of a pin's output latch
    pub fn output_level(&self, pin: Pin) -> Level {
        self.state().outputs.get(&pin).copied().unwrap_or(Level::Low)
    }

    pub fn chip_select(&self) -> ChipSelect {
        self.state().chip_select
    }

    pub fn spi_config(&self) -> SpiConfig {
        self.state().spi
    }

    /// Total bytes clocked across all exchanges
    pub fn bytes_clocked(&self) -> usize {
        self.state().bytes_clocked
    }

    /// Clock divider in effect at each exchange
    pub fn divider_at_exchanges(&self) -> Vec<u16> {
        self.state().divider_at_exchanges.clone()
    }
}

impl PeripheralDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_hardware(&self) -> bool {
        true
    }

    fn map(&mut self) -> Result<()> {
        self.record(Event::Map);
        let mut state = self.state();
        if state.fail_map {
            return Err(Error::init("mock mapping refused"));
        }
        state.mapped = true;
        Ok(())
    }

    fn unmap(&mut self) {
        self.record(Event::Unmap);
        self.state().mapped = false;
    }

    fn gpio_fsel(&mut self, pin: Pin, function: PinFunction) {
        self.record(Event::Fsel(pin, function));
        self.state().functions.insert(pin, function);
    }

    fn gpio_function(&self, pin: Pin) -> PinFunction {
        self.state()
            .functions
            .get(&pin)
            .copied()
            .unwrap_or(PinFunction::Input)
    }

    fn gpio_write(&mut self, pin: Pin, level: Level) {
        self.record(Event::Write(pin, level));
        self.state().outputs.insert(pin, level);
    }

    fn gpio_level(&self, pin: Pin) -> Level {
        let state = self.state();
        let levels = match state.functions.get(&pin) {
            Some(PinFunction::Output) => &state.outputs,
            _ => &state.inputs,
        };
        levels.get(&pin).copied().unwrap_or(Level::Low)
    }

    fn spi_chip_select(&mut self, cs: ChipSelect) {
        self.record(Event::ChipSelect(cs));
        self.state().chip_select = cs;
    }

    fn spi_set_data_mode(&mut self, mode: DataMode) {
        self.record(Event::DataMode(mode));
        self.state().spi.data_mode = mode;
    }

    fn spi_set_bit_order(&mut self, order: BitOrder) {
        self.record(Event::BitOrder(order));
        self.state().spi.bit_order = order;
    }

    fn spi_set_clock_divider(&mut self, divider: u16) {
        self.record(Event::ClockDivider(divider));
        self.state().spi.clock_divider = divider;
    }

    fn spi_begin(&mut self) {
        self.record(Event::Begin);
    }

    fn spi_exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.record(Event::Exchange(tx.to_vec()));
        let mut state = self.state();
        if state.fail_exchange {
            return Err(Error::TransferFailed("mock exchange fault".to_string()));
        }

        let source = state.response.clone().unwrap_or_else(|| tx.to_vec());
        for (dst, src) in rx.iter_mut().zip(source.iter()) {
            *dst = *src;
        }
        state.bytes_clocked += tx.len();
        let divider = state.spi.clock_divider;
        state.divider_at_exchanges.push(divider);
        Ok(())
    }

    fn spi_end(&mut self) {
        self.record(Event::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_log() {
        let mock = MockDriver::new();
        let mut driver = mock.clone();
        driver.gpio_write(3, Level::High);
        assert_eq!(mock.events(), vec![Event::Write(3, Level::High)]);
        assert_eq!(mock.output_level(3), Level::High);
    }

    #[test]
    fn test_loopback_and_response() {
        let mut mock = MockDriver::new();
        let mut rx = [0u8; 2];
        mock.spi_exchange(&[7, 8], &mut rx).unwrap();
        assert_eq!(rx, [7, 8]);

        mock.respond_with(vec![1]);
        let mut rx = [0u8; 2];
        mock.spi_exchange(&[7, 8], &mut rx).unwrap();
        assert_eq!(rx, [1, 0]);
        assert_eq!(mock.bytes_clocked(), 4);
    }
}
