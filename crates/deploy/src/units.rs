//! The units of the Corn suite and typed handles for the entry points we call.

use alloy_core::primitives::{Address, Bytes, U256};

use crate::abi::encode_call;

/// The project token.
pub const TOKEN: &str = "Corn";
/// The token/native exchange.
pub const EXCHANGE: &str = "CornDEX";
/// The lending unit.
pub const LENDING: &str = "Lending";
/// Helper that moves the exchange price by trading against it.
pub const PRICE_MOVER: &str = "MovePrice";
/// Helper that liquidates lending positions with a flash loan.
pub const FLASH_LOAN_LIQUIDATOR: &str = "FlashLoanLiquidator";
/// Helper that opens leveraged lending positions.
pub const LEVERAGE: &str = "Leverage";

/// Units deployed on every network.
pub const CORE_UNITS: [&str; 3] = [TOKEN, EXCHANGE, LENDING];
/// Units deployed on the local development network only.
pub const AUXILIARY_UNITS: [&str; 3] = [PRICE_MOVER, FLASH_LOAN_LIQUIDATOR, LEVERAGE];

/// Handle on a deployed `Corn` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUnit {
    pub address: Address,
}

impl TokenUnit {
    pub const MINT_TO: &'static str = "mintTo(address,uint256)";
    pub const APPROVE: &'static str = "approve(address,uint256)";
    pub const BALANCE_OF: &'static str = "balanceOf(address)";

    pub fn mint_to(&self, to: Address, amount: U256) -> Bytes {
        encode_call(Self::MINT_TO, &[to.into(), amount.into()])
    }

    pub fn approve(&self, spender: Address, amount: U256) -> Bytes {
        encode_call(Self::APPROVE, &[spender.into(), amount.into()])
    }

    pub fn balance_of(&self, owner: Address) -> Bytes {
        encode_call(Self::BALANCE_OF, &[owner.into()])
    }
}

/// Handle on a deployed `CornDEX` exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeUnit {
    pub address: Address,
}

impl ExchangeUnit {
    /// `init(uint256 tokens)` is payable: the native value sent with the call
    /// becomes the native side of the pool.
    pub const INIT: &'static str = "init(uint256)";

    pub fn init(&self, token_amount: U256) -> Bytes {
        encode_call(Self::INIT, &[token_amount.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{calldata_address, calldata_uint, selector};

    #[test]
    fn test_mint_to_calldata() {
        let token = TokenUnit {
            address: Address::repeat_byte(1),
        };
        let to = Address::repeat_byte(2);
        let data = token.mint_to(to, U256::from(5u64));

        assert_eq!(&data[..4], &selector(TokenUnit::MINT_TO));
        assert_eq!(calldata_address(&data, 0), Some(to));
        assert_eq!(calldata_uint(&data, 1), Some(U256::from(5u64)));
    }

    #[test]
    fn test_init_calldata() {
        let exchange = ExchangeUnit {
            address: Address::repeat_byte(3),
        };
        let data = exchange.init(U256::from(1000u64));

        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &selector(ExchangeUnit::INIT));
        assert_eq!(calldata_uint(&data, 0), Some(U256::from(1000u64)));
    }

    #[test]
    fn test_unit_sets_are_disjoint() {
        for unit in CORE_UNITS {
            assert!(!AUXILIARY_UNITS.contains(&unit));
        }
    }
}
