//! Bit-exact address encoding and decoding.
//!
//! An [`Address`] is an opaque 64-bit value. [`AddressMapping`] decomposes it
//! into `(channel, rank, bankgroup, bank, row, column)` according to a
//! 12-character mapping string (spec §6), default `"rorabgbachco"`: each pair
//! of characters names one field, read left-to-right from the most- to the
//! least-significant group, with the group order determining bit position.
//! `switch_co_ch` swaps the column-low bits with the channel bits for
//! stride-friendly interleaving. `encode_pim_header`/`encode_pim_comps_readres`
//! pack PIM batch-size operands into the same field layout.

use crate::common::error::SimError;

/// An opaque 64-bit physical address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u64);

impl Address {
    /// Wraps a raw value as an `Address`.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 64-bit value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Decoded operand fields from a `P_HEADER` transaction (spec §4.4).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PimHeaderFields {
    pub row: u32,
    pub for_gwrite: bool,
    pub comps_log2: u32,
    pub num_readres: u32,
}

/// A fully decoded address: one index per field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DecodedAddress {
    pub channel: u32,
    pub rank: u32,
    pub bankgroup: u32,
    pub bank: u32,
    pub row: u32,
    pub column: u32,
}

/// The six fields an address is decomposed into, named by their two-letter
/// code in the mapping string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Row,
    Rank,
    BankGroup,
    Bank,
    Channel,
    Column,
}

impl Field {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "ro" => Some(Field::Row),
            "ra" => Some(Field::Rank),
            "bg" => Some(Field::BankGroup),
            "ba" => Some(Field::Bank),
            "ch" => Some(Field::Channel),
            "co" => Some(Field::Column),
            _ => None,
        }
    }
}

/// Device geometry and field-ordering used to pack/unpack addresses.
///
/// Field widths are `ceil(log2(count))` for each dimension; the mapping
/// string determines the order fields are stacked in, most-significant
/// group first, down to a `low_bits`-wide byte-offset field that is never
/// materialized as part of the decoded tuple.
#[derive(Clone, Debug)]
pub struct AddressMapping {
    order: Vec<Field>,
    channel_bits: u32,
    rank_bits: u32,
    bankgroup_bits: u32,
    bank_bits: u32,
    row_bits: u32,
    column_bits: u32,
    low_bits: u32,
}

fn bits_for(count: u32) -> u32 {
    if count <= 1 {
        0
    } else {
        32 - (count - 1).leading_zeros()
    }
}

impl AddressMapping {
    /// Builds a mapping from device geometry and a 12-character mapping
    /// string (spec §6). Returns [`SimError::Config`] if the string is not
    /// exactly 12 characters (6 two-letter field codes) or names an unknown
    /// field.
    pub fn new(
        mapping: &str,
        channels: u32,
        ranks: u32,
        bankgroups: u32,
        banks: u32,
        rows: u32,
        columns: u32,
        burst_length: u32,
        bus_width_bytes: u32,
    ) -> Result<Self, SimError> {
        if mapping.len() != 12 {
            return Err(SimError::Config {
                message: format!(
                    "address_mapping must be exactly 12 characters (got {}): {mapping}",
                    mapping.len()
                ),
            });
        }
        let mut order = Vec::with_capacity(6);
        for chunk in mapping.as_bytes().chunks(2) {
            let code = std::str::from_utf8(chunk).unwrap_or("");
            let field = Field::from_code(code).ok_or_else(|| SimError::Config {
                message: format!("unknown address field code: {code}"),
            })?;
            order.push(field);
        }
        Ok(Self {
            order,
            channel_bits: bits_for(channels),
            rank_bits: bits_for(ranks),
            bankgroup_bits: bits_for(bankgroups),
            bank_bits: bits_for(banks),
            row_bits: bits_for(rows),
            column_bits: bits_for(columns),
            low_bits: bits_for(burst_length * bus_width_bytes),
        })
    }

    fn width_of(&self, field: Field) -> u32 {
        match field {
            Field::Row => self.row_bits,
            Field::Rank => self.rank_bits,
            Field::BankGroup => self.bankgroup_bits,
            Field::Bank => self.bank_bits,
            Field::Channel => self.channel_bits,
            Field::Column => self.column_bits,
        }
    }

    fn value_of(&self, field: Field, d: &DecodedAddress) -> u64 {
        u64::from(match field {
            Field::Row => d.row,
            Field::Rank => d.rank,
            Field::BankGroup => d.bankgroup,
            Field::Bank => d.bank,
            Field::Channel => d.channel,
            Field::Column => d.column,
        })
    }

    /// Packs `(channel, rank, bankgroup, bank, row, column)` into an
    /// [`Address`] per `make_address ∘ address_mapping == identity`.
    #[must_use]
    pub fn make_address(
        &self,
        channel: u32,
        rank: u32,
        bankgroup: u32,
        bank: u32,
        row: u32,
        column: u32,
    ) -> Address {
        let decoded = DecodedAddress {
            channel,
            rank,
            bankgroup,
            bank,
            row,
            column,
        };
        let mut raw: u64 = 0;
        let mut offset = self.low_bits;
        for field in self.order.iter().rev() {
            let width = self.width_of(*field);
            let value = self.value_of(*field, &decoded) & mask(width);
            raw |= value << offset;
            offset += width;
        }
        Address(raw)
    }

    /// Decodes an [`Address`] into its six fields.
    #[must_use]
    pub fn decode(&self, addr: Address) -> DecodedAddress {
        let mut out = DecodedAddress::default();
        let mut offset = self.low_bits;
        for field in self.order.iter().rev() {
            let width = self.width_of(*field);
            let value = ((addr.0 >> offset) & mask(width)) as u32;
            match field {
                Field::Row => out.row = value,
                Field::Rank => out.rank = value,
                Field::BankGroup => out.bankgroup = value,
                Field::Bank => out.bank = value,
                Field::Channel => out.channel = value,
                Field::Column => out.column = value,
            }
            offset += width;
        }
        out
    }

    /// Swaps the channel field with the low `channel_bits` bits of the
    /// column field, for stride-friendly channel interleaving.
    #[must_use]
    pub fn switch_co_ch(&self, addr: Address) -> Address {
        let mut d = self.decode(addr);
        let co_low_mask = mask(self.channel_bits) as u32;
        let co_low = d.column & co_low_mask;
        let ch = d.channel & co_low_mask;
        d.column = (d.column & !co_low_mask) | ch;
        d.channel = co_low;
        self.make_address(d.channel, d.rank, d.bankgroup, d.bank, d.row, d.column)
    }

    /// The bit index of the `for_gwrite` marker within the column
    /// sub-field: its top bit, so it survives `make_address`'s
    /// `& mask(column_bits)` truncation (spec §6).
    fn pim_header_marker_bit(&self) -> u32 {
        self.column_bits.saturating_sub(1)
    }

    /// Encodes a `P_HEADER` operand pair into a row-addressed transaction,
    /// per spec §6: `log2(num_comps)` in the column sub-field's low bits,
    /// `for_gwrite` in that sub-field's top bit, `log2(num_readres)`
    /// distributed across rank/bankgroup/bank as `(readres/16,
    /// (readres/4)%4, readres%4)`.
    #[must_use]
    pub fn encode_pim_header(
        &self,
        channel: u32,
        row: u32,
        for_gwrite: bool,
        num_comps: u32,
        num_readres: u32,
    ) -> Address {
        let comps_log2 = bits_for(num_comps.max(1));
        let column = comps_log2 | (u32::from(for_gwrite) << self.pim_header_marker_bit());
        let rank = num_readres / 16;
        let bankgroup = (num_readres / 4) % 4;
        let bank = num_readres % 4;
        self.make_address(channel, rank, bankgroup, bank, row, column)
    }

    /// Decodes a `P_HEADER` transaction encoded by [`Self::encode_pim_header`]
    /// back into its operand fields (spec §4.4: arms the following
    /// COMP/COMPS_READRES/READRES sequence without issuing a physical
    /// command). `num_comps` is only recoverable as its encoded `log2`.
    #[must_use]
    pub fn decode_pim_header(&self, addr: Address) -> PimHeaderFields {
        let decoded = self.decode(addr);
        let marker_bit = self.pim_header_marker_bit();
        let for_gwrite = (decoded.column >> marker_bit) & 1 == 1;
        let comps_log2 = decoded.column & mask(marker_bit) as u32;
        let num_readres = decoded.rank * 16 + decoded.bankgroup * 4 + decoded.bank;
        PimHeaderFields {
            row: decoded.row,
            for_gwrite,
            comps_log2,
            num_readres,
        }
    }

    /// Encodes a `COMPS_READRES` operand pair: `num_comps - 1` distributed
    /// across rank/bankgroup/bank the same way as [`Self::encode_pim_header`],
    /// `is_last` in column bit 0.
    #[must_use]
    pub fn encode_pim_comps_readres(
        &self,
        channel: u32,
        row: u32,
        num_comps: u32,
        is_last: bool,
    ) -> Address {
        let n = num_comps.saturating_sub(1);
        let rank = n / 16;
        let bankgroup = (n / 4) % 4;
        let bank = n % 4;
        let column = u32::from(is_last);
        self.make_address(channel, rank, bankgroup, bank, row, column)
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_mapping() -> AddressMapping {
        AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap()
    }

    #[test]
    fn round_trips_through_decode() {
        let mapping = device_mapping();
        let addr = mapping.make_address(3, 1, 2, 3, 12345, 7);
        let decoded = mapping.decode(addr);
        assert_eq!(decoded.channel, 3);
        assert_eq!(decoded.rank, 1);
        assert_eq!(decoded.bankgroup, 2);
        assert_eq!(decoded.bank, 3);
        assert_eq!(decoded.row, 12345);
        assert_eq!(decoded.column, 7);
    }

    #[test]
    fn rejects_bad_mapping_length() {
        let err = AddressMapping::new("roraba", 16, 2, 4, 4, 32768, 1024, 8, 2);
        assert!(matches!(err, Err(SimError::Config { .. })));
    }

    #[test]
    fn pim_header_round_trips_powers_of_two() {
        let mapping = device_mapping();
        let addr = mapping.encode_pim_header(1, 99, true, 8, 16);
        let fields = mapping.decode_pim_header(addr);
        assert_eq!(fields.row, 99);
        assert_eq!(fields.comps_log2, 3); // log2(8)
        assert!(fields.for_gwrite);
        assert_eq!(fields.num_readres, 16);
    }

    #[test]
    fn pim_header_marker_bit_survives_column_masking() {
        let mapping = device_mapping();
        // column_bits is bits_for(1024) == 10; the marker must sit at bit 9,
        // not bit 31, or make_address's `& mask(column_bits)` would discard it.
        assert_eq!(mapping.column_bits, 10);
        let addr = mapping.encode_pim_header(0, 0, true, 1, 0);
        let fields = mapping.decode_pim_header(addr);
        assert!(fields.for_gwrite);

        let addr_no_marker = mapping.encode_pim_header(0, 0, false, 1, 0);
        let fields_no_marker = mapping.decode_pim_header(addr_no_marker);
        assert!(!fields_no_marker.for_gwrite);
    }
}
