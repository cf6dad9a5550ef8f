//! Byte encoding of exchange messages
//!
//! Message 1 is a single polynomial, message 2 a polynomial followed by a
//! signal. All integers are little-endian.
//!
//! ```text
//! polynomial: u32 count | u32 width | count * width bytes (each coefficient LE, zero-padded)
//! signal:     u32 bits  | ceil(bits / 8) bytes (LSB-first)
//! ```

use std::io::{Cursor, Read, Write};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed};
use crate::error::{Result, RlweError};
use crate::exchange::{ReconciliationSignal, ResponderMessage};
use crate::polynomial::Polynomial;

/// Bytes per coefficient for residues in `[0, q)`
pub fn coefficient_width(q: &BigInt) -> usize {
    let bits = (q - BigInt::one()).bits() as usize;
    ((bits + 7) / 8).max(1)
}

fn length_prefix(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        RlweError::InvalidParameters(format!("{} length {} does not fit in u32", what, len))
    })
}

fn check_residue(c: &BigInt, q: &BigInt) -> Result<()> {
    if c.is_negative() || c >= q {
        return Err(RlweError::InvalidMessage(format!(
            "Coefficient {} is outside [0, {})",
            c, q
        )));
    }
    Ok(())
}

/// Writes a reduced polynomial
///
/// # Arguments
/// * `writer` - Destination
/// * `poly` - Polynomial whose coefficients all lie in `[0, q)`
/// * `q` - Coefficient modulus, which fixes the coefficient width
pub fn write_polynomial<W: Write>(writer: &mut W, poly: &Polynomial, q: &BigInt) -> Result<()> {
    let width = coefficient_width(q);
    let coefficients = poly.coefficients();

    writer.write_u32::<LittleEndian>(length_prefix(coefficients.len(), "Polynomial")?)?;
    writer.write_u32::<LittleEndian>(length_prefix(width, "Coefficient")?)?;

    let mut buf = vec![0u8; width];
    for c in coefficients {
        check_residue(c, q)?;
        let (_, bytes) = c.to_bytes_le();
        buf.fill(0);
        buf[..bytes.len()].copy_from_slice(&bytes);
        writer.write_all(&buf)?;
    }
    Ok(())
}

/// Reads a polynomial written by `write_polynomial` with the same modulus
pub fn read_polynomial<R: Read>(reader: &mut R, q: &BigInt) -> Result<Polynomial> {
    let count = reader.read_u32::<LittleEndian>()? as usize;
    let width = reader.read_u32::<LittleEndian>()? as usize;

    let expected = coefficient_width(q);
    if width != expected {
        return Err(RlweError::InvalidMessage(format!(
            "Coefficient width {} does not match modulus, expected {}",
            width, expected
        )));
    }
    if count == 0 {
        return Err(RlweError::InvalidMessage(
            "Polynomial has no coefficients".to_string(),
        ));
    }

    let mut coefficients = Vec::new();
    let mut buf = vec![0u8; width];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        let c = BigInt::from_bytes_le(Sign::Plus, &buf);
        check_residue(&c, q)?;
        coefficients.push(c);
    }
    Polynomial::new(coefficients)
}

pub fn write_signal<W: Write>(writer: &mut W, signal: &ReconciliationSignal) -> Result<()> {
    writer.write_u32::<LittleEndian>(length_prefix(signal.len(), "Signal")?)?;
    for chunk in signal.bits().chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |byte, (i, &bit)| byte | (bit << i));
        writer.write_u8(byte)?;
    }
    Ok(())
}

/// Reads a signal written by `write_signal`
///
/// Padding bits in the final byte must be zero.
pub fn read_signal<R: Read>(reader: &mut R) -> Result<ReconciliationSignal> {
    let count = reader.read_u32::<LittleEndian>()? as usize;

    let mut bits = Vec::new();
    let mut remaining = count;
    while remaining > 0 {
        let byte = reader.read_u8()?;
        let take = remaining.min(8);
        if take < 8 && byte >> take != 0 {
            return Err(RlweError::InvalidMessage(
                "Signal padding bits are not zero".to_string(),
            ));
        }
        bits.extend((0..take).map(|i| (byte >> i) & 1));
        remaining -= take;
    }
    ReconciliationSignal::new(bits)
}

fn ensure_consumed(cursor: &Cursor<&[u8]>) -> Result<()> {
    let trailing = cursor.get_ref().len() as u64 - cursor.position();
    if trailing != 0 {
        return Err(RlweError::InvalidMessage(format!(
            "{} trailing bytes after message",
            trailing
        )));
    }
    Ok(())
}

/// Encodes message 1, the initiator's public value
pub fn encode_polynomial(poly: &Polynomial, q: &BigInt) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_polynomial(&mut bytes, poly, q)?;
    Ok(bytes)
}

/// Decodes message 1; the whole buffer must be consumed
pub fn decode_polynomial(bytes: &[u8], q: &BigInt) -> Result<Polynomial> {
    let mut cursor = Cursor::new(bytes);
    let poly = read_polynomial(&mut cursor, q)?;
    ensure_consumed(&cursor)?;
    Ok(poly)
}

impl ResponderMessage {
    /// Encodes message 2: the responder's public value, then its signal
    pub fn to_bytes(&self, q: &BigInt) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        write_polynomial(&mut bytes, &self.public, q)?;
        write_signal(&mut bytes, &self.signal)?;
        Ok(bytes)
    }

    /// Decodes message 2; the whole buffer must be consumed
    ///
    /// Only the framing and coefficient range are checked here. Whether the
    /// lengths match the ring degree is checked by `RlweKeyExchange::complete`.
    pub fn from_bytes(bytes: &[u8], q: &BigInt) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let public = read_polynomial(&mut cursor, q)?;
        let signal = read_signal(&mut cursor)?;
        ensure_consumed(&cursor)?;
        Ok(Self { public, signal })
    }
}
