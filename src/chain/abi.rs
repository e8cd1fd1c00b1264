//! Solidity surface of the invoice factory and the token standards it
//! settles in. Only what the front-end calls is declared.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolEvent};

use super::types::{ContractCall, RawInvoice, RawReceipt, RawStatus, ReadCall};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IInvoiceFactory {
        struct InvoiceRecord {
            uint256 id;
            address provider;
            address client;
            address token;
            uint256[] amounts;
            uint256 total;
            uint256 amountReleased;
            uint256 currMilestone;
            uint256 dueDate;
            uint8 status;
            bool isErc721;
        }

        event InvoiceCreated(uint256 indexed invoiceId, address indexed provider, address indexed client);

        function createInvoice(
            address provider,
            address client,
            address token,
            uint256[] amounts,
            uint256 dueDate,
            bool isErc721
        ) external returns (uint256);
        function deposit(uint256 invoiceId, address token, uint256[] amounts, bool isErc721) external payable;
        function release(uint256 invoiceId, uint256 releaseUntil) external;
        function withdraw(uint256 tokenId, uint256 balance) external;
        function getInvoice(uint256 invoiceId) external view returns (InvoiceRecord);
        function getInvoicesByProvider(address provider) external view returns (InvoiceRecord[]);
        function getInvoicesByClient(address client) external view returns (InvoiceRecord[]);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IERC721 {
        function approve(address to, uint256 tokenId) external;
    }
}

/// ABI-encodes a state-mutating call.
pub fn encode_call(call: &ContractCall) -> Bytes {
    let data = match call {
        ContractCall::CreateInvoice {
            provider,
            client,
            token,
            amounts,
            due_date,
            is_erc721,
        } => IInvoiceFactory::createInvoiceCall {
            provider: *provider,
            client: *client,
            token: *token,
            amounts: amounts.clone(),
            dueDate: U256::from(*due_date),
            isErc721: *is_erc721,
        }
        .abi_encode(),
        ContractCall::Deposit {
            invoice_id,
            token,
            amounts,
            is_erc721,
            ..
        } => IInvoiceFactory::depositCall {
            invoiceId: U256::from(*invoice_id),
            token: *token,
            amounts: amounts.clone(),
            isErc721: *is_erc721,
        }
        .abi_encode(),
        ContractCall::Release {
            invoice_id,
            release_until,
        } => IInvoiceFactory::releaseCall {
            invoiceId: U256::from(*invoice_id),
            releaseUntil: U256::from(*release_until),
        }
        .abi_encode(),
        ContractCall::Withdraw { token_id, balance } => IInvoiceFactory::withdrawCall {
            tokenId: *token_id,
            balance: *balance,
        }
        .abi_encode(),
        ContractCall::ApproveErc20 { spender, amount, .. } => IERC20::approveCall {
            spender: *spender,
            amount: *amount,
        }
        .abi_encode(),
        ContractCall::ApproveErc721 {
            spender, token_id, ..
        } => IERC721::approveCall {
            to: *spender,
            tokenId: *token_id,
        }
        .abi_encode(),
    };

    Bytes::from(data)
}

/// ABI-encodes a read and returns `(target, calldata)`.
pub fn encode_read(call: &ReadCall, invoice_contract: Address) -> (Address, Bytes) {
    let (target, data) = match call {
        ReadCall::GetInvoice(id) => (
            invoice_contract,
            IInvoiceFactory::getInvoiceCall {
                invoiceId: U256::from(*id),
            }
            .abi_encode(),
        ),
        ReadCall::InvoicesByProvider(provider) => (
            invoice_contract,
            IInvoiceFactory::getInvoicesByProviderCall { provider: *provider }.abi_encode(),
        ),
        ReadCall::InvoicesByClient(client) => (
            invoice_contract,
            IInvoiceFactory::getInvoicesByClientCall { client: *client }.abi_encode(),
        ),
        ReadCall::TokenSymbol(token) => (*token, IERC20::symbolCall {}.abi_encode()),
        ReadCall::TokenDecimals(token) => (*token, IERC20::decimalsCall {}.abi_encode()),
    };

    (target, Bytes::from(data))
}

/// Id of the invoice created by `contract` in this receipt, if the
/// `InvoiceCreated` event is present.
pub fn created_invoice_id(receipt: &RawReceipt, contract: Address) -> Option<u64> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.first() == Some(&IInvoiceFactory::InvoiceCreated::SIGNATURE_HASH))
        .find_map(|log| {
            let topic = log.topics.get(1)?;
            u64::try_from(U256::from_be_bytes(topic.0)).ok()
        })
}

impl From<IInvoiceFactory::InvoiceRecord> for RawInvoice {
    fn from(record: IInvoiceFactory::InvoiceRecord) -> Self {
        RawInvoice {
            id: record.id,
            provider: record.provider,
            client: record.client,
            token: record.token,
            amounts: record.amounts,
            total: record.total,
            amount_released: record.amountReleased,
            curr_milestone: record.currMilestone,
            due_date: record.dueDate,
            status: RawStatus::Ordinal(record.status),
            is_erc721: record.isErc721,
        }
    }
}
