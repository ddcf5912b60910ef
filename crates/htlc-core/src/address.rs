//! Lock locators.
//!
//! A locator renders a lock's 32-byte content digest as a Bech32m ([BIP-350])
//! string whose human-readable prefix names the ledger and network:
//!
//! | ledger      | mainnet | testnet |
//! |-------------|---------|---------|
//! | `utxo`      | `ut1…`  | `tut1…` |
//! | `account`   | `ac1…`  | `tac1…` |
//! | `sidechain` | `sc1…`  | `tsc1…` |
//!
//! The payload is a version value (currently 0) followed by the digest in
//! 5-bit groups. [`Bech32Encoder`] is the bundled [`AddressEncoder`].
//!
//! [BIP-350]: https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{LEDGER_HRPS, LOCATOR_VERSION};
use crate::error::AddressError;
use crate::traits::AddressEncoder;
use crate::types::Hash256;

/// Bech32m checksum constant (BIP-350).
const BECH32M_CONST: u32 = 0x2bc830a3;

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Network a transaction or locator belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Human-readable prefix for `ledger` on `network`.
pub fn hrp_for(ledger: &str, network: Network) -> Result<&'static str, AddressError> {
    LEDGER_HRPS
        .iter()
        .find(|(name, _, _)| *name == ledger)
        .map(|(_, main, test)| match network {
            Network::Mainnet => *main,
            Network::Testnet => *test,
        })
        .ok_or_else(|| AddressError::UnknownLedger(ledger.to_string()))
}

/// Reverse lookup of [`hrp_for`].
fn ledger_for_hrp(hrp: &str) -> Result<(&'static str, Network), AddressError> {
    for (name, main, test) in LEDGER_HRPS {
        if hrp == *main {
            return Ok((*name, Network::Mainnet));
        }
        if hrp == *test {
            return Ok((*name, Network::Testnet));
        }
    }
    Err(AddressError::InvalidHrp)
}

/// A decoded lock locator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    ledger: &'static str,
    network: Network,
    version: u8,
    digest: Hash256,
}

impl Locator {
    /// Locator for a lock digest on `ledger`/`network`.
    pub fn new(digest: Hash256, ledger: &str, network: Network) -> Result<Self, AddressError> {
        // Resolve through the table so the stored name is 'static.
        let hrp = hrp_for(ledger, network)?;
        let (ledger, _) = ledger_for_hrp(hrp)?;
        Ok(Self {
            ledger,
            network,
            version: LOCATOR_VERSION,
            digest,
        })
    }

    pub fn ledger(&self) -> &'static str {
        self.ledger
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// The lock content digest.
    pub fn digest(&self) -> Hash256 {
        self.digest
    }

    /// Encode as a Bech32m string.
    pub fn encode(&self) -> Result<String, AddressError> {
        let hrp = hrp_for(self.ledger, self.network)?;
        let data_5bit =
            convert_bits(self.digest.as_bytes(), 8, 5, true).ok_or(AddressError::InvalidPadding)?;

        let mut payload = Vec::with_capacity(1 + data_5bit.len());
        payload.push(self.version);
        payload.extend_from_slice(&data_5bit);

        let checksum = bech32m_create_checksum(hrp, &payload);

        let mut result = String::with_capacity(hrp.len() + 1 + payload.len() + 6);
        result.push_str(hrp);
        result.push('1');
        for &d in payload.iter().chain(checksum.iter()) {
            result.push(CHARSET[d as usize] as char);
        }
        Ok(result)
    }

    /// Decode a Bech32m locator string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }

        let s_lower = s.to_ascii_lowercase();
        let sep_pos = s_lower.rfind('1').ok_or(AddressError::MissingSeparator)?;
        if sep_pos == 0 {
            return Err(AddressError::InvalidHrp);
        }
        // 6 checksum chars + 1 version char at minimum.
        if sep_pos + 8 > s_lower.len() {
            return Err(AddressError::InvalidLength);
        }

        let hrp = &s_lower[..sep_pos];
        let data_part = &s_lower[sep_pos + 1..];

        let mut data = Vec::with_capacity(data_part.len());
        for c in data_part.chars() {
            let pos = CHARSET
                .iter()
                .position(|&ch| ch as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            data.push(pos as u8);
        }

        if !bech32m_verify_checksum(hrp, &data) {
            return Err(AddressError::InvalidChecksum);
        }
        let (ledger, network) = ledger_for_hrp(hrp)?;

        let payload = &data[..data.len() - 6];
        let Some((&version, rest)) = payload.split_first() else {
            return Err(AddressError::InvalidLength);
        };
        if version != LOCATOR_VERSION {
            return Err(AddressError::InvalidVersion(version));
        }

        let bytes = convert_bits(rest, 5, 8, false).ok_or(AddressError::InvalidPadding)?;
        let digest = Hash256::from_slice(&bytes).ok_or(AddressError::InvalidLength)?;

        Ok(Self {
            ledger,
            network,
            version,
            digest,
        })
    }
}

impl FromStr for Locator {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// The bundled Bech32m [`AddressEncoder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Bech32Encoder;

impl AddressEncoder for Bech32Encoder {
    fn encode(
        &self,
        digest: &Hash256,
        ledger: &str,
        network: Network,
    ) -> Result<String, AddressError> {
        Locator::new(*digest, ledger, network)?.encode()
    }
}

// --- Bech32m internals ---

fn bech32m_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

fn bech32m_hrp_expand(hrp: &str) -> Vec<u8> {
    hrp.bytes()
        .map(|c| c >> 5)
        .chain(std::iter::once(0))
        .chain(hrp.bytes().map(|c| c & 31))
        .collect()
}

fn bech32m_create_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
    let mut values = bech32m_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32m_polymod(&values) ^ BECH32M_CONST;
    let mut out = [0u8; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

fn bech32m_verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = bech32m_hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32m_polymod(&values) == BECH32M_CONST
}

/// Regroup bits between widths (8-bit bytes to 5-bit groups and back).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}
