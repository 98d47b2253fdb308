// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory register store of a single unit.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng as _, SeedableRng as _};

use crate::{
    config::SlaveSettings,
    frame::{Address, Coil, Quantity, Word},
};

/// The four independent data spaces of one unit.
///
/// Every space is a sparse map keyed by the zero-based local address.
/// Unset addresses read as `false` / `0x0000` unless random simulation
/// is enabled:
///
/// - coils and input registers get a random value on their first read
///   that is kept until it is overwritten,
/// - discrete inputs get a fresh random value on *every* read.
#[derive(Debug)]
pub struct Registers {
    simulation: bool,
    rng: StdRng,
    coils: HashMap<Address, Coil>,
    discrete_inputs: HashMap<Address, Coil>,
    input_registers: HashMap<Address, Word>,
    holding_registers: HashMap<Address, Word>,
}

impl Registers {
    #[must_use]
    pub fn new(settings: &SlaveSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Create a store that draws simulated values from `rng`.
    #[must_use]
    pub fn with_rng(settings: &SlaveSettings, rng: StdRng) -> Self {
        Self {
            simulation: settings.random_simulation,
            rng,
            coils: HashMap::new(),
            discrete_inputs: HashMap::new(),
            input_registers: HashMap::new(),
            holding_registers: HashMap::new(),
        }
    }

    pub fn read_coil(&mut self, address: Address) -> Coil {
        let Self {
            simulation,
            rng,
            coils,
            ..
        } = self;
        if *simulation {
            *coils.entry(address).or_insert_with(|| rng.gen())
        } else {
            coils.get(&address).copied().unwrap_or_default()
        }
    }

    pub fn write_coil(&mut self, address: Address, coil: Coil) {
        self.coils.insert(address, coil);
    }

    pub fn read_discrete_input(&mut self, address: Address) -> Coil {
        if self.simulation {
            let contact = self.rng.gen();
            self.discrete_inputs.insert(address, contact);
            contact
        } else {
            self.discrete_inputs
                .get(&address)
                .copied()
                .unwrap_or_default()
        }
    }

    /// Preset a discrete input.
    ///
    /// Has no visible effect while simulation is enabled because every
    /// read draws a new value.
    pub fn set_discrete_input(&mut self, address: Address, contact: Coil) {
        self.discrete_inputs.insert(address, contact);
    }

    /// The value returned by the most recent read (or preset) of a discrete input.
    #[must_use]
    pub fn last_discrete_input(&self, address: Address) -> Option<Coil> {
        self.discrete_inputs.get(&address).copied()
    }

    pub fn read_input_register(&mut self, address: Address) -> Word {
        let Self {
            simulation,
            rng,
            input_registers,
            ..
        } = self;
        if *simulation {
            *input_registers
                .entry(address)
                .or_insert_with(|| rng.gen())
        } else {
            input_registers.get(&address).copied().unwrap_or_default()
        }
    }

    /// Preset an input register, replacing any cached simulated value.
    pub fn set_input_register(&mut self, address: Address, word: Word) {
        self.input_registers.insert(address, word);
    }

    #[must_use]
    pub fn read_holding_register(&self, address: Address) -> Word {
        self.holding_registers
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn write_holding_register(&mut self, address: Address, word: Word) {
        self.holding_registers.insert(address, word);
    }

    pub fn read_coils(&mut self, address: Address, quantity: Quantity) -> Vec<Coil> {
        addresses(address, quantity)
            .map(|address| self.read_coil(address))
            .collect()
    }

    pub fn write_coils(&mut self, address: Address, coils: &[Coil]) {
        for (address, coil) in addresses(address, u16_count(coils.len())).zip(coils) {
            self.write_coil(address, *coil);
        }
    }

    pub fn read_discrete_inputs(&mut self, address: Address, quantity: Quantity) -> Vec<Coil> {
        addresses(address, quantity)
            .map(|address| self.read_discrete_input(address))
            .collect()
    }

    pub fn read_input_registers(&mut self, address: Address, quantity: Quantity) -> Vec<Word> {
        addresses(address, quantity)
            .map(|address| self.read_input_register(address))
            .collect()
    }

    #[must_use]
    pub fn read_holding_registers(&self, address: Address, quantity: Quantity) -> Vec<Word> {
        addresses(address, quantity)
            .map(|address| self.read_holding_register(address))
            .collect()
    }

    pub fn write_holding_registers(&mut self, address: Address, words: &[Word]) {
        for (address, word) in addresses(address, u16_count(words.len())).zip(words) {
            self.write_holding_register(address, *word);
        }
    }
}

/// Local addresses of a window, clipped at the end of the 16-bit address space.
fn addresses(address: Address, quantity: Quantity) -> impl Iterator<Item = Address> {
    (0..quantity).map_while(move |offset| address.checked_add(offset))
}

fn u16_count(len: usize) -> Quantity {
    Quantity::try_from(len).unwrap_or(Quantity::MAX)
}
