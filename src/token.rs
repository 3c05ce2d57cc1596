//! Token addresses and the well-known token registry
//!
//! Address validation is purely syntactic and runs before any network call.
//! The registry is the single source of truth for tokens the agent treats as
//! established (deep rug checks are skipped for them).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base58 alphabet (Bitcoin ordering, no 0/O/I/l)
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Solana public keys are 32 bytes, which encode to 32..=44 base58 characters
const SOLANA_MIN_LEN: usize = 32;
const SOLANA_MAX_LEN: usize = 44;

/// Chains the data providers can be queried for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
    Base,
    Bsc,
}

impl Chain {
    /// Chain identifier used by GoPlus (`"solana"` uses a dedicated endpoint)
    pub fn goplus_id(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "1",
            Chain::Base => "8453",
            Chain::Bsc => "56",
        }
    }

    /// Chain slug used by DexScreener and CertiK
    pub fn slug(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
        }
    }

    pub fn is_evm(&self) -> bool {
        !matches!(self, Chain::Solana)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Chain {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solana" | "sol" => Ok(Chain::Solana),
            "ethereum" | "eth" | "1" => Ok(Chain::Ethereum),
            "base" | "8453" => Ok(Chain::Base),
            "bsc" | "bnb" | "56" => Ok(Chain::Bsc),
            other => Err(crate::Error::InvalidArgument(format!(
                "Unknown chain '{}'. Supported: solana, ethereum, base, bsc",
                other
            ))),
        }
    }
}

/// A syntactically valid token address and the chain it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress {
    address: String,
    chain: Chain,
}

impl TokenAddress {
    /// Validate `raw` and detect its chain.
    ///
    /// Base58 strings of Solana key length are Solana mints; `0x` + 40 hex
    /// digits are EVM contracts (detected as Ethereum).
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let address = raw.trim();

        if address.is_empty() {
            return Err(crate::Error::InvalidAddress(
                "Token address is empty".to_string(),
            ));
        }

        if let Some(hex) = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
        {
            if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(Self {
                    address: format!("0x{}", hex.to_lowercase()),
                    chain: Chain::Ethereum,
                });
            }
            return Err(crate::Error::InvalidAddress(format!(
                "'{}' is not a valid EVM address (expected 0x followed by 40 hex digits)",
                address
            )));
        }

        if !(SOLANA_MIN_LEN..=SOLANA_MAX_LEN).contains(&address.len()) {
            return Err(crate::Error::InvalidAddress(format!(
                "'{}' has length {}, expected {}-{} base58 characters",
                address,
                address.len(),
                SOLANA_MIN_LEN,
                SOLANA_MAX_LEN
            )));
        }

        if let Some(bad) = address.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(crate::Error::InvalidAddress(format!(
                "'{}' contains invalid base58 character '{}'",
                address, bad
            )));
        }

        Ok(Self {
            address: address.to_string(),
            chain: Chain::Solana,
        })
    }

    /// Validate `raw`, then move an EVM address onto another EVM chain
    pub fn parse_on(raw: &str, chain: Option<Chain>) -> crate::Result<Self> {
        let parsed = Self::parse(raw)?;
        match chain {
            None => Ok(parsed),
            Some(chain) => parsed.with_chain(chain),
        }
    }

    /// Re-target the address to `chain`; only valid within the same family
    pub fn with_chain(self, chain: Chain) -> crate::Result<Self> {
        if self.chain.is_evm() != chain.is_evm() {
            return Err(crate::Error::InvalidAddress(format!(
                "'{}' is a {} address and cannot be used on {}",
                self.address, self.chain, chain
            )));
        }
        Ok(Self { chain, ..self })
    }

    pub fn as_str(&self) -> &str {
        &self.address
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    /// Short form used as a search term (first 8 characters)
    pub fn short(&self) -> &str {
        let end = self.address.len().min(8);
        &self.address[..end]
    }

    /// Registry entry for this address, if it is a well-known token
    pub fn known(&self) -> Option<&'static KnownToken> {
        lookup(self.chain, &self.address)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

impl FromStr for TokenAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Well-known token metadata
#[derive(Debug, Clone, Copy)]
pub struct KnownToken {
    /// Token symbol (e.g., "USDC", "SOL")
    pub symbol: &'static str,
    pub name: &'static str,
    pub chain: Chain,
    pub address: &'static str,
    /// Whether this is a stablecoin (pegged to $1)
    pub is_stablecoin: bool,
    /// Established tokens skip deep rug checks in the narrative
    pub is_established: bool,
}

impl KnownToken {
    const fn established(
        symbol: &'static str,
        name: &'static str,
        chain: Chain,
        address: &'static str,
        is_stablecoin: bool,
    ) -> Self {
        Self {
            symbol,
            name,
            chain,
            address,
            is_stablecoin,
            is_established: true,
        }
    }
}

/// Well-known token addresses per chain
pub mod addresses {
    // === Solana ===
    pub const SOL: &str = "So11111111111111111111111111111111111111112";
    pub const USDC_SOL: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    pub const USDT_SOL: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
    pub const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
    pub const JUP: &str = "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN";

    // === Ethereum Mainnet ===
    pub const USDC_ETH: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    pub const USDT_ETH: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    pub const WETH_ETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";

    // === Base ===
    pub const USDC_BASE: &str = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913";
}

static REGISTRY: &[KnownToken] = &[
    KnownToken::established("SOL", "Wrapped SOL", Chain::Solana, addresses::SOL, false),
    KnownToken::established("USDC", "USD Coin", Chain::Solana, addresses::USDC_SOL, true),
    KnownToken::established("USDT", "Tether USD", Chain::Solana, addresses::USDT_SOL, true),
    KnownToken::established("BONK", "Bonk", Chain::Solana, addresses::BONK, false),
    KnownToken::established("JUP", "Jupiter", Chain::Solana, addresses::JUP, false),
    KnownToken::established("USDC", "USD Coin", Chain::Ethereum, addresses::USDC_ETH, true),
    KnownToken::established("USDT", "Tether USD", Chain::Ethereum, addresses::USDT_ETH, true),
    KnownToken::established("WETH", "Wrapped Ether", Chain::Ethereum, addresses::WETH_ETH, false),
    KnownToken::established("USDC", "USD Coin", Chain::Base, addresses::USDC_BASE, true),
];

/// Look up a registry entry by chain and address
pub fn lookup(chain: Chain, address: &str) -> Option<&'static KnownToken> {
    REGISTRY.iter().find(|t| {
        t.chain == chain
            && if chain.is_evm() {
                t.address.eq_ignore_ascii_case(address)
            } else {
                t.address == address
            }
    })
}

/// Look up a registry entry by symbol on a chain
pub fn lookup_symbol(chain: Chain, symbol: &str) -> Option<&'static KnownToken> {
    REGISTRY
        .iter()
        .find(|t| t.chain == chain && t.symbol.eq_ignore_ascii_case(symbol))
}

/// Example tokens shown in the REPL help
pub fn examples() -> impl Iterator<Item = &'static KnownToken> {
    REGISTRY
        .iter()
        .filter(|t| t.chain == Chain::Solana && matches!(t.symbol, "SOL" | "USDC" | "BONK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_solana_mint() {
        let addr = TokenAddress::parse(addresses::SOL).unwrap();
        assert_eq!(addr.chain(), Chain::Solana);
        assert_eq!(addr.as_str(), addresses::SOL);
        assert_eq!(addr.short(), "So111111");
    }

    #[test]
    fn parses_evm_address_lowercased() {
        let addr = TokenAddress::parse("0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eB48").unwrap();
        assert_eq!(addr.chain(), Chain::Ethereum);
        assert_eq!(addr.as_str(), addresses::USDC_ETH);
        assert!(addr.known().is_some());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "   ",
            "not-an-address",
            "0x1234",
            "0xZZb86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            // 0 and l are outside the base58 alphabet
            "So1111111111111111111111111111111111111110",
            "Sol1111111111111111111111111111111111111112",
            "So1111111111111111111111111111111111111111111111112",
        ] {
            let err = TokenAddress::parse(bad).unwrap_err();
            assert!(
                matches!(err, crate::Error::InvalidAddress(_)),
                "expected InvalidAddress for {bad:?}"
            );
        }
    }

    #[test]
    fn evm_address_can_move_between_evm_chains() {
        let addr = TokenAddress::parse_on(addresses::USDC_BASE, Some(Chain::Base)).unwrap();
        assert_eq!(addr.chain(), Chain::Base);
        assert!(addr.known().is_some());

        let err = TokenAddress::parse_on(addresses::SOL, Some(Chain::Bsc)).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidAddress(_)));
    }

    #[test]
    fn chain_parsing_and_ids() {
        assert_eq!("SOL".parse::<Chain>().unwrap(), Chain::Solana);
        assert_eq!("56".parse::<Chain>().unwrap(), Chain::Bsc);
        assert_eq!(Chain::Base.goplus_id(), "8453");
        assert!("tron".parse::<Chain>().is_err());
    }

    #[test]
    fn registry_examples_cover_repl_help() {
        let symbols: Vec<_> = examples().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec!["SOL", "USDC", "BONK"]);
        assert!(lookup_symbol(Chain::Solana, "bonk").unwrap().is_established);
    }
}
