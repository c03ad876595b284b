// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault and wrapped-ethscription contract bindings.
//!
//! Only the external surface the relayer touches is declared here; contract
//! internals live on-chain.
//!
//! `Deposited` and `Burned` are bound twice. The topic0 hash is the same for
//! both layouts, so a deployment may emit the arguments either as indexed
//! topics or in the data section; the watcher picks by topic count.

use alloy::sol;

// AppChain side: ethscriptions are locked in and released from the Vault.
sol! {
    #[sol(rpc)]
    interface IVault {
        event Deposited(bytes32 indexed ethscriptionId, address indexed owner);
        event Withdrawn(bytes32 indexed ethscriptionId, address indexed to);

        function withdraw(bytes32 ethscriptionId, address to) external;
    }
}

// Mainnet side: the wrapped ERC-721 representation.
sol! {
    #[sol(rpc)]
    interface IWrappedEthscription {
        event Burned(bytes32 indexed ethscriptionId, address indexed owner);
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        function mint(bytes32 ethscriptionId, address to) external;
    }
}

// Same events with both arguments in the data section.
sol! {
    interface IVaultData {
        event Deposited(bytes32 ethscriptionId, address owner);
    }
}

sol! {
    interface IWrappedEthscriptionData {
        event Burned(bytes32 ethscriptionId, address owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn event_topics_match_signatures() {
        assert_eq!(
            IVault::Deposited::SIGNATURE_HASH,
            keccak256("Deposited(bytes32,address)")
        );
        assert_eq!(
            IWrappedEthscription::Burned::SIGNATURE_HASH,
            keccak256("Burned(bytes32,address)")
        );
        // keccak256("Transfer(address,address,uint256)")
        let expected = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        let actual = format!(
            "0x{}",
            alloy::hex::encode(IWrappedEthscription::Transfer::SIGNATURE_HASH.as_slice())
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn data_layout_shares_topic0() {
        assert_eq!(
            IVaultData::Deposited::SIGNATURE_HASH,
            IVault::Deposited::SIGNATURE_HASH
        );
        assert_eq!(
            IWrappedEthscriptionData::Burned::SIGNATURE_HASH,
            IWrappedEthscription::Burned::SIGNATURE_HASH
        );
    }

    #[test]
    fn call_selectors_match_signatures() {
        assert_eq!(
            IWrappedEthscription::mintCall::SELECTOR,
            keccak256("mint(bytes32,address)")[..4]
        );
        assert_eq!(
            IVault::withdrawCall::SELECTOR,
            keccak256("withdraw(bytes32,address)")[..4]
        );
    }
}
