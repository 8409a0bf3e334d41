//! A simulated CAT25256 behind both transport traits, recording every bus call.

use crate::address::Channel;
use crate::transport::{AsyncTransport, Capability, Transport};

const CAPACITY: usize = 0x8000;
const PAGE: usize = crate::PAGE_SIZE as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Select(Channel),
    Transmit(Vec<u8>),
    Receive(usize),
    Deselect(Channel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    Transmit,
    Receive,
    Select,
    Deselect,
}

/// Which call of a kind should fail, counted from zero
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    pub transmit: Option<usize>,
    pub receive: Option<usize>,
    pub select: Option<usize>,
    pub deselect: Option<usize>,
}

pub struct SimEeprom {
    pub memory: Vec<u8>,
    pub events: Vec<Event>,
    /// Committed write frames, address and data length
    pub writes: Vec<(u32, usize)>,
    pub faults: Faults,
    pub missing: Option<Capability>,
    /// Number of status reads reporting busy after each write cycle
    pub write_cycle_polls: usize,
    /// Status bytes served before falling back to the simulated state
    pub scripted_status: Vec<u8>,
    status: u8,
    wel: bool,
    busy_polls: usize,
    frame: Vec<u8>,
    read_cursor: usize,
    counts: [usize; 4],
}

impl SimEeprom {
    pub fn new() -> Self {
        Self {
            memory: vec![crate::ERASED; CAPACITY],
            events: Vec::new(),
            writes: Vec::new(),
            faults: Faults::default(),
            missing: None,
            write_cycle_polls: 2,
            scripted_status: Vec::new(),
            status: 0,
            wel: false,
            busy_polls: 0,
            frame: Vec::new(),
            read_cursor: 0,
            counts: [0; 4],
        }
    }

    pub fn status(&self) -> u8 {
        let mut status = self.status & 0b1000_1100;
        if self.wel {
            status |= 0b10;
        }
        if self.busy_polls > 0 {
            status |= 0b1;
        }
        status
    }

    /// Number of status register reads issued so far
    pub fn status_reads(&self) -> usize {
        self.events
            .windows(2)
            .filter(|w| w[0] == Event::Transmit(vec![0x05]) && w[1] == Event::Receive(1))
            .count()
    }

    fn fault(&mut self, kind: usize, fault: Option<usize>, error: SimError) -> Result<(), SimError> {
        let count = self.counts[kind];
        self.counts[kind] += 1;
        match fault {
            Some(n) if n == count => Err(error),
            _ => Ok(()),
        }
    }

    fn frame_address(&self) -> usize {
        ((self.frame[1] as usize) << 8 | self.frame[2] as usize) % CAPACITY
    }

    fn do_select(&mut self, channel: Channel) -> Result<(), SimError> {
        self.events.push(Event::Select(channel));
        self.fault(0, self.faults.select, SimError::Select)?;
        self.frame.clear();
        self.read_cursor = 0;
        Ok(())
    }

    fn do_transmit(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        self.events.push(Event::Transmit(bytes.to_vec()));
        self.fault(1, self.faults.transmit, SimError::Transmit)?;
        self.frame.extend_from_slice(bytes);
        Ok(())
    }

    fn do_receive(&mut self, buffer: &mut [u8]) -> Result<(), SimError> {
        self.events.push(Event::Receive(buffer.len()));
        self.fault(2, self.faults.receive, SimError::Receive)?;
        match self.frame.first() {
            Some(0x05) => {
                for byte in buffer.iter_mut() {
                    *byte = if self.scripted_status.is_empty() {
                        let status = self.status();
                        self.busy_polls = self.busy_polls.saturating_sub(1);
                        status
                    } else {
                        self.scripted_status.remove(0)
                    };
                }
            }
            Some(0x03) if self.frame.len() >= 3 => {
                let start = self.frame_address();
                for byte in buffer.iter_mut() {
                    *byte = self.memory[(start + self.read_cursor) % CAPACITY];
                    self.read_cursor += 1;
                }
            }
            _ => buffer.fill(0),
        }
        Ok(())
    }

    fn do_deselect(&mut self, channel: Channel) -> Result<(), SimError> {
        self.events.push(Event::Deselect(channel));
        self.fault(3, self.faults.deselect, SimError::Deselect)?;
        match self.frame.first() {
            Some(0x06) => self.wel = true,
            Some(0x04) => self.wel = false,
            Some(0x02) if self.frame.len() >= 3 => {
                let start = self.frame_address();
                let data = &self.frame[3..];
                self.writes.push((start as u32, data.len()));
                if self.wel {
                    let page = start - start % PAGE;
                    for (i, byte) in data.iter().enumerate() {
                        self.memory[page + (start + i) % PAGE] = *byte;
                    }
                    self.wel = false;
                    self.busy_polls = self.write_cycle_polls;
                }
            }
            Some(0x01) if self.frame.len() >= 2 && self.wel => {
                self.status = self.frame[1];
                self.wel = false;
                self.busy_polls = self.write_cycle_polls;
            }
            _ => {}
        }
        self.frame.clear();
        Ok(())
    }
}

impl Transport for SimEeprom {
    type Error = SimError;

    fn provides(&self, capability: Capability) -> bool {
        self.missing != Some(capability)
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.do_transmit(bytes)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.do_receive(buffer)
    }

    fn select(&mut self, channel: Channel) -> Result<(), Self::Error> {
        self.do_select(channel)
    }

    fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error> {
        self.do_deselect(channel)
    }
}

impl AsyncTransport for SimEeprom {
    type Error = SimError;

    fn provides(&self, capability: Capability) -> bool {
        self.missing != Some(capability)
    }

    async fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.do_transmit(bytes)
    }

    async fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.do_receive(buffer)
    }

    async fn select(&mut self, channel: Channel) -> Result<(), Self::Error> {
        self.do_select(channel)
    }

    async fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error> {
        self.do_deselect(channel)
    }
}
