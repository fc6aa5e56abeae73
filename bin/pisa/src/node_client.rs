//! The concrete JSON-RPC node client, using `web3` over HTTP with a
//! single-threaded Tokio runtime to give the core's synchronous
//! [`pisa_node::NodeClient`] trait a blocking face.

use ethereum_types::{Address, H256, U256};
use pisa_node::{NodeClient, NodeError};
use pisa_types::{Block, BlockNumber, Log, MinedTransaction};
use web3::transports::Http;
use web3::types::{BlockId, BlockNumber as Web3BlockNumber, Bytes, FilterBuilder};
use web3::Web3;

pub struct Web3NodeClient {
    runtime: tokio::runtime::Runtime,
    web3: Web3<Http>,
}

impl Web3NodeClient {
    pub fn new(rpc_url: &str) -> Result<Self, NodeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NodeError::new(e.to_string()))?;
        let transport = Http::new(rpc_url).map_err(|e| NodeError::new(e.to_string()))?;
        Ok(Web3NodeClient { runtime, web3: Web3::new(transport) })
    }

    pub(crate) fn web3(&self) -> &Web3<Http> {
        &self.web3
    }

    pub(crate) fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    fn fetch_logs(&self, hash: H256) -> Result<Vec<Log>, NodeError> {
        let filter = FilterBuilder::default().block_hash(hash).build();
        let logs = self.block_on(self.web3.eth().logs(filter)).map_err(|e| NodeError::new(e.to_string()))?;
        Ok(logs.into_iter().map(convert_log).collect())
    }
}

fn convert_log(log: web3::types::Log) -> Log {
    Log {
        address: log.address,
        topics: log.topics,
        data: log.data.0,
        transaction_hash: log.transaction_hash.unwrap_or_default(),
    }
}

fn convert_transaction(tx: web3::types::Transaction) -> MinedTransaction {
    MinedTransaction {
        hash: tx.hash,
        from: tx.from.unwrap_or_default(),
        to: tx.to,
        value: tx.value,
        gas_limit: tx.gas,
        input: tx.input.0,
        nonce: tx.nonce,
    }
}

impl NodeClient for Web3NodeClient {
    fn get_block_number(&self) -> Result<BlockNumber, NodeError> {
        let number = self.block_on(self.web3.eth().block_number()).map_err(|e| NodeError::new(e.to_string()))?;
        Ok(number.as_u64())
    }

    fn get_block_by_hash(&self, hash: H256) -> Result<Option<Block>, NodeError> {
        let header = self
            .block_on(self.web3.eth().block(BlockId::Hash(hash)))
            .map_err(|e| NodeError::new(e.to_string()))?;
        let header = match header {
            Some(header) => header,
            None => return Ok(None),
        };
        let logs = self.fetch_logs(hash)?;
        Ok(Some(Block {
            hash,
            parent_hash: header.parent_hash,
            number: header.number.map(|n| n.as_u64()).unwrap_or_default(),
            transaction_hashes: header.transactions,
            logs,
            transactions: None,
        }))
    }

    fn get_block_by_number(&self, number: BlockNumber, with_txs: bool) -> Result<Option<Block>, NodeError> {
        let id = BlockId::Number(Web3BlockNumber::Number(number.into()));
        if with_txs {
            let block = self
                .block_on(self.web3.eth().block_with_txs(id))
                .map_err(|e| NodeError::new(e.to_string()))?;
            let block = match block {
                Some(block) => block,
                None => return Ok(None),
            };
            let hash = block.hash.ok_or_else(|| NodeError::new("pending block has no hash"))?;
            let logs = self.fetch_logs(hash)?;
            let transaction_hashes = block.transactions.iter().map(|tx| tx.hash).collect();
            let transactions = block.transactions.into_iter().map(convert_transaction).collect();
            Ok(Some(Block {
                hash,
                parent_hash: block.parent_hash,
                number: block.number.map(|n| n.as_u64()).unwrap_or(number),
                transaction_hashes,
                logs,
                transactions: Some(transactions),
            }))
        } else {
            let block = self
                .block_on(self.web3.eth().block(id))
                .map_err(|e| NodeError::new(e.to_string()))?;
            let block = match block {
                Some(block) => block,
                None => return Ok(None),
            };
            let hash = block.hash.ok_or_else(|| NodeError::new("pending block has no hash"))?;
            let logs = self.fetch_logs(hash)?;
            Ok(Some(Block {
                hash,
                parent_hash: block.parent_hash,
                number: block.number.map(|n| n.as_u64()).unwrap_or(number),
                transaction_hashes: block.transactions,
                logs,
                transactions: None,
            }))
        }
    }

    fn get_code(&self, address: Address) -> Result<Vec<u8>, NodeError> {
        let code = self.block_on(self.web3.eth().code(address, None)).map_err(|e| NodeError::new(e.to_string()))?;
        Ok(code.0)
    }

    fn get_transaction_count(&self, address: Address, pending: bool) -> Result<U256, NodeError> {
        let block = if pending { Web3BlockNumber::Pending } else { Web3BlockNumber::Latest };
        self.block_on(self.web3.eth().transaction_count(address, Some(block)))
            .map_err(|e| NodeError::new(e.to_string()))
    }

    fn get_balance(&self, address: Address) -> Result<U256, NodeError> {
        self.block_on(self.web3.eth().balance(address, None)).map_err(|e| NodeError::new(e.to_string()))
    }

    fn get_gas_price(&self) -> Result<U256, NodeError> {
        self.block_on(self.web3.eth().gas_price()).map_err(|e| NodeError::new(e.to_string()))
    }

    fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<H256, NodeError> {
        self.block_on(self.web3.eth().send_raw_transaction(Bytes(raw))).map_err(|e| NodeError::new(e.to_string()))
    }
}
