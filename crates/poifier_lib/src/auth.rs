//! Upload credentials.

use std::fmt;

use alloy::hex;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::MnemonicBuilder;
use alloy::signers::Signer;
use poifier_common_types::IndexerAddress;

use crate::config::Secret;
use crate::PoifierError;

/// The message that is signed to prove control over the indexer's operator
/// wallet.
pub const SIGNED_MESSAGE: &str = "poifier-token-sign";

/// The derivation path of the first account of a BIP-44 Ethereum wallet.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Where the upload credential comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// A token issued by the POIfier server, used verbatim.
    Token(Secret),
    /// A credential derived by signing [`SIGNED_MESSAGE`] with the wallet
    /// behind `mnemonic`.
    Wallet {
        mnemonic: Secret,
        indexer_address: IndexerAddress,
    },
}

/// The value of the `token` header sent along with every upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Produces the upload credential. Wallet credentials have the form
/// `<lowercase indexer address>:<0x-prefixed hex signature>`.
pub async fn credential(source: &CredentialSource) -> Result<Credential, PoifierError> {
    match source {
        CredentialSource::Token(token) => Ok(Credential(token.expose().to_owned())),
        CredentialSource::Wallet {
            mnemonic,
            indexer_address,
        } => {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(mnemonic.expose().trim())
                .derivation_path(DERIVATION_PATH)
                .and_then(|builder| builder.build())
                .map_err(|_| PoifierError::config("invalid `mnemonic`"))?;

            let signature = signer
                .sign_message(SIGNED_MESSAGE.as_bytes())
                .await
                .map_err(|e| PoifierError::config(format!("failed to sign credential: {}", e)))?;

            // `IndexerAddress` always displays as lowercase hex.
            Ok(Credential(format!(
                "{}:{}",
                indexer_address,
                hex::encode_prefixed(signature.as_bytes())
            )))
        }
    }
}
