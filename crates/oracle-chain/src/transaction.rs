//! Neo N3 transaction and witness construction for the dual-signed
//! `updatePriceBatch` submission (TEE signer + Master signer).

use oracle_crypto::keys::verification_script_for;
use oracle_crypto::{sign_digest, transaction_signing_digest, KeyPair};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ChainError, ChainResult};

/// `WitnessScope.CalledByEntry` — both signers in this oracle only authorize
/// the entry-point contract invocation, never the whole chain of calls.
pub const SCOPE_CALLED_BY_ENTRY: u8 = 0x01;

#[derive(Debug, Clone)]
pub struct TransactionSigner {
    pub account_script_hash: [u8; 20],
    pub scopes: u8,
}

#[derive(Debug, Clone)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

/// An unsigned Neo N3 transaction, assembled with both signers declared but
/// no witnesses attached yet.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub version: u8,
    pub nonce: u32,
    pub system_fee: i64,
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<TransactionSigner>,
    pub script: Vec<u8>,
}

/// A transaction with both the TEE and Master witnesses attached, ready to be
/// base64-encoded and broadcast via `sendrawtransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub unsigned: UnsignedTransaction,
    pub witnesses: Vec<Witness>,
}

impl UnsignedTransaction {
    /// Builds the transaction body that is hashed and signed; witnesses are
    /// appended separately and are not part of this digest.
    pub fn to_unsigned_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.version);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.system_fee.to_le_bytes());
        out.extend_from_slice(&self.network_fee.to_le_bytes());
        out.extend_from_slice(&self.valid_until_block.to_le_bytes());

        write_var_int(&mut out, self.signers.len() as u64);
        for signer in &self.signers {
            out.extend_from_slice(&signer.account_script_hash);
            out.push(signer.scopes);
        }

        write_var_int(&mut out, 0); // no transaction attributes
        write_var_bytes(&mut out, &self.script);
        out
    }

    /// Signs the transaction with both identities, producing two witnesses in
    /// the order Neo requires: sorted by account script hash ascending.
    pub fn sign_dual(
        self,
        tee_key: &KeyPair,
        master_key: &KeyPair,
        network_magic: u32,
    ) -> ChainResult<SignedTransaction> {
        let body = self.to_unsigned_bytes();
        let digest = transaction_signing_digest(&body, network_magic);

        let mut witnesses = vec![
            witness_for(tee_key, &digest)?,
            witness_for(master_key, &digest)?,
        ];

        let tee_hash = tee_key.script_hash();
        let master_hash = master_key.script_hash();
        if master_hash < tee_hash {
            witnesses.swap(0, 1);
        }

        Ok(SignedTransaction {
            unsigned: self,
            witnesses,
        })
    }
}

fn witness_for(key: &KeyPair, digest: &[u8; 32]) -> ChainResult<Witness> {
    let signature = sign_digest(key, digest)?;
    let mut invocation_script = Vec::with_capacity(2 + 64);
    invocation_script.push(0x0c); // PUSHDATA1
    invocation_script.push(64);
    invocation_script.extend_from_slice(&signature);

    Ok(Witness {
        invocation_script,
        verification_script: verification_script_for(&key.public_key_bytes()),
    })
}

impl SignedTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.unsigned.to_unsigned_bytes();
        write_var_int(&mut out, self.witnesses.len() as u64);
        for witness in &self.witnesses {
            write_var_bytes(&mut out, &witness.invocation_script);
            write_var_bytes(&mut out, &witness.verification_script);
        }
        out
    }

    pub fn to_base64(&self) -> String {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        STANDARD.encode(self.to_bytes())
    }
}

/// Builds the `signers` JSON array shared by `invokefunction`/`invokescript`
/// simulation calls and the real transaction's signer list.
pub fn signers_json(tee_hash_hex: &str, master_hash_hex: &str) -> Value {
    json!([
        { "account": tee_hash_hex, "scopes": "CalledByEntry" },
        { "account": master_hash_hex, "scopes": "CalledByEntry" },
    ])
}

/// Assembles the `updatePriceBatch(symbols[], prices[], timestamps[],
/// confidences[])` invocation script against the oracle contract, NeoVM
/// style: push each argument array in reverse order, PACK them into the
/// argument array, then PUSHDATA the method name, the contract hash, and a
/// `SYSCALL System.Contract.Call`.
pub fn build_update_price_batch_script(
    contract_hash: &[u8; 20],
    symbols: &[String],
    prices: &[i64],
    timestamps: &[i64],
    confidences: &[u8],
) -> ChainResult<Vec<u8>> {
    let n = symbols.len();
    if prices.len() != n || timestamps.len() != n || confidences.len() != n {
        return Err(ChainError::ConstructionFailed(
            "symbols, prices, timestamps, and confidences must have equal length".to_string(),
        ));
    }

    let confidence_values: Vec<i64> = confidences.iter().map(|&c| c as i64).collect();

    let mut script = Vec::new();
    push_int_array(&mut script, &confidence_values);
    push_int_array(&mut script, timestamps);
    push_int_array(&mut script, prices);
    push_string_array(&mut script, symbols);

    write_var_int(&mut script, 4); // argument count for a CallFlags.All system call pack
    script.push(0xc1); // PACK
    push_string(&mut script, "updatePriceBatch");
    push_bytes(&mut script, contract_hash);
    script.push(0x41); // SYSCALL
    script.extend_from_slice(&SYSTEM_CONTRACT_CALL);

    Ok(script)
}

/// Assembles a NEP-17 `transfer(from, to, amount, data)` invocation script
/// against an asset contract, used to sweep a balance from the TEE account
/// to the Master account. `data` is always pushed as null.
pub fn build_transfer_script(asset_hash: &[u8; 20], from: &[u8; 20], to: &[u8; 20], amount: i64) -> Vec<u8> {
    let mut script = Vec::new();
    script.push(0x0b); // PUSHNULL (the optional `data` argument)
    push_int(&mut script, amount);
    push_bytes(&mut script, to);
    push_bytes(&mut script, from);

    write_var_int(&mut script, 4);
    script.push(0xc1); // PACK
    push_string(&mut script, "transfer");
    push_bytes(&mut script, asset_hash);
    script.push(0x41); // SYSCALL
    script.extend_from_slice(&SYSTEM_CONTRACT_CALL);

    script
}

const SYSTEM_CONTRACT_CALL: [u8; 4] = [0x62, 0x7d, 0x5b, 0x52];

fn push_string(out: &mut Vec<u8>, s: &str) {
    push_bytes(out, s.as_bytes());
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    match bytes.len() {
        0..=75 => {
            out.push(bytes.len() as u8);
        }
        76..=255 => {
            out.push(0x0c);
            out.push(bytes.len() as u8);
        }
        len => {
            out.push(0x0d);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
    }
    out.extend_from_slice(bytes);
}

fn push_int(out: &mut Vec<u8>, value: i64) {
    out.push(0x02); // PUSHINT64 marker region start; followed by 8 LE bytes
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_int_array(out: &mut Vec<u8>, values: &[i64]) {
    for value in values.iter().rev() {
        push_int(out, *value);
    }
    write_var_int(out, values.len() as u64);
    out.push(0xc1); // PACK
}

fn push_string_array(out: &mut Vec<u8>, values: &[String]) {
    for value in values.iter().rev() {
        push_string(out, value);
    }
    write_var_int(out, values.len() as u64);
    out.push(0xc1); // PACK
}

fn write_var_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub hash_hex: String,
    pub size_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_sign_orders_witnesses_by_script_hash() {
        let tee = KeyPair::generate().unwrap();
        let master = KeyPair::generate().unwrap();

        let unsigned = UnsignedTransaction {
            version: 0,
            nonce: 1,
            system_fee: 1_000_000,
            network_fee: 500_000,
            valid_until_block: 100,
            signers: vec![
                TransactionSigner {
                    account_script_hash: tee.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
                TransactionSigner {
                    account_script_hash: master.script_hash(),
                    scopes: SCOPE_CALLED_BY_ENTRY,
                },
            ],
            script: vec![0x40],
        };

        let signed = unsigned.sign_dual(&tee, &master, 860833102).unwrap();
        assert_eq!(signed.witnesses.len(), 2);

        let first_hash = oracle_crypto::keys::script_hash_of(&signed.witnesses[0].verification_script);
        let second_hash = oracle_crypto::keys::script_hash_of(&signed.witnesses[1].verification_script);
        assert!(first_hash <= second_hash);
    }

    #[test]
    fn update_price_batch_script_requires_matching_lengths() {
        let err = build_update_price_batch_script(
            &[0u8; 20],
            &["BTCUSDT".to_string()],
            &[],
            &[1_700_000_000_000],
            &[90],
        );
        assert!(err.is_err());
    }

    #[test]
    fn update_price_batch_script_builds_nonempty_bytes() {
        let script = build_update_price_batch_script(
            &[0u8; 20],
            &["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            &[4_500_000_000_000, 250_000_000_000],
            &[1_700_000_000_000, 1_700_000_000_001],
            &[100, 80],
        )
        .unwrap();
        assert!(!script.is_empty());
    }

    #[test]
    fn transfer_script_builds_nonempty_bytes() {
        let script = build_transfer_script(&[1u8; 20], &[2u8; 20], &[3u8; 20], 500_000_000);
        assert!(!script.is_empty());
    }
}
