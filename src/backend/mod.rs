//! CPU execution substrate for the gradient kernels.
//!
//! Kernels run each parallel unit to completion inside a single rayon
//! dispatch. Units that own disjoint output rows write through chunked
//! mutable slices; units that share output rows (tiles updating the same
//! point) accumulate through [`GradientBuffer`].

use std::sync::atomic::{AtomicU32, Ordering};

/// A dense `f32` gradient buffer accepting concurrent accumulation.
///
/// Slots hold `f32` bit patterns so that addition can run as a
/// compare-and-swap loop on [`AtomicU32`]. The sum over concurrent writers
/// is associative up to floating-point rounding; ordering across writers is
/// unspecified.
#[derive(Debug, Default)]
pub struct GradientBuffer {
    slots: Vec<AtomicU32>,
}

impl GradientBuffer {
    /// Adds `value` to the slot at `index`.
    #[inline]
    pub fn add(
        &self,
        index: usize,
        value: f32,
    ) {
        let slot = &self.slots[index];
        let mut bits = slot.load(Ordering::Relaxed);
        loop {
            let sum = (f32::from_bits(bits) + value).to_bits();
            match slot.compare_exchange_weak(
                bits,
                sum,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => bits = current,
            }
        }
    }

    #[inline]
    pub fn into_vec(self) -> Vec<f32> {
        self.slots
            .into_iter()
            .map(|slot| f32::from_bits(slot.into_inner()))
            .collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn zeros(count: usize) -> Self {
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, || AtomicU32::new(0.0_f32.to_bits()));
        Self { slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_buffer_accumulates_concurrently() {
        use rayon::prelude::*;

        let buffer = GradientBuffer::zeros(4);
        (0..1000_usize).into_par_iter().for_each(|index| {
            buffer.add(index % 4, 0.25);
        });

        let values = buffer.into_vec();
        for value in values {
            assert_eq!(value, 62.5);
        }
    }
}
