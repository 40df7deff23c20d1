//! Transaction builder and simulator.
//!
//! Every operation gets a fresh [`PendingTransaction`]: a single move call with an
//! explicit sender. It is turned into transaction bytes by the ledger and dry-run
//! before anyone is asked to sign it. A failing dry-run is a normal
//! [`SimulationOutcome`], not an error; the caller decides whether to go on to
//! signing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    error::{is_gas_selection_message, LoginKitError},
    ledger::LedgerRpc,
    primitives::{LedgerAddress, ObjectId, ParseFromForeignBinding},
};

/// A pure (non-object) call argument.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum PureArg {
    /// Unsigned 64-bit integer.
    U64 {
        /// The value.
        value: u64,
    },
    /// Boolean.
    Bool {
        /// The value.
        value: bool,
    },
    /// UTF-8 string.
    Str {
        /// The value.
        value: String,
    },
    /// Ledger address.
    Address {
        /// The address, `0x`-prefixed hex.
        value: String,
    },
    /// Byte vector.
    Bytes {
        /// The value.
        value: Vec<u8>,
    },
}

/// One positional argument of a move call.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum CallArg {
    /// An on-chain object, passed by id. Must also be listed as a referenced object.
    Object {
        /// The object id.
        id: String,
    },
    /// A pure value.
    Pure {
        /// The value.
        value: PureArg,
    },
}

impl CallArg {
    /// Object argument.
    pub fn object(id: impl Into<String>) -> Self {
        Self::Object { id: id.into() }
    }

    /// `u64` argument.
    #[must_use]
    pub const fn u64(value: u64) -> Self {
        Self::Pure {
            value: PureArg::U64 { value },
        }
    }

    /// `bool` argument.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self::Pure {
            value: PureArg::Bool { value },
        }
    }

    /// String argument.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Pure {
            value: PureArg::Str {
                value: value.into(),
            },
        }
    }

    /// Address argument.
    pub fn address(value: impl Into<String>) -> Self {
        Self::Pure {
            value: PureArg::Address {
                value: value.into(),
            },
        }
    }

    /// `vector<u8>` argument.
    #[must_use]
    pub const fn bytes(value: Vec<u8>) -> Self {
        Self::Pure {
            value: PureArg::Bytes { value },
        }
    }
}

/// Fully qualified entry point, `package::module::function`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTarget {
    /// Package id.
    pub package: ObjectId,
    /// Module name.
    pub module: String,
    /// Function name.
    pub function: String,
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

/// Argument as sent to the ledger: object ids parsed, pure values checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArg {
    /// Object by id.
    Object(ObjectId),
    /// Pure value.
    Pure(PureArg),
}

impl ResolvedArg {
    /// JSON form accepted by the ledger's move-call builder.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Object(id) => json!(id.to_string()),
            // u64 travels as a string, JSON numbers lose precision above 2^53
            Self::Pure(PureArg::U64 { value }) => json!(value.to_string()),
            Self::Pure(PureArg::Bool { value }) => json!(value),
            Self::Pure(PureArg::Str { value } | PureArg::Address { value }) => json!(value),
            Self::Pure(PureArg::Bytes { value }) => json!(value),
        }
    }
}

/// An unsigned, fully-populated move call. Built fresh for every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Entry point.
    pub target: MoveTarget,
    /// Positional arguments, in call order.
    pub arguments: Vec<ResolvedArg>,
    /// Sender, always set explicitly.
    pub sender: LedgerAddress,
    /// Objects the call touches.
    pub referenced_objects: Vec<ObjectId>,
    /// Gas budget.
    pub gas_budget: u64,
}

/// Final status of an evaluated transaction.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum ExecutionStatus {
    /// Executed without abort.
    Success,
    /// Aborted; nothing would be committed.
    Failure {
        /// Error reported by the ledger (abort code, insufficient gas, ...).
        error: String,
    },
}

/// Gas charged by an evaluated transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, uniffi::Record)]
pub struct GasSummary {
    /// Execution cost.
    pub computation_cost: u64,
    /// Storage written.
    pub storage_cost: u64,
    /// Storage freed.
    pub storage_rebate: u64,
}

impl GasSummary {
    /// What the sender would pay, net of the rebate.
    #[must_use]
    pub const fn net_cost(&self) -> u64 {
        self.computation_cost
            .saturating_add(self.storage_cost)
            .saturating_sub(self.storage_rebate)
    }
}

/// Result of a dry-run.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SimulationOutcome {
    /// `package::module::function` that was simulated.
    pub target: String,
    /// Sender the transaction was built for.
    pub sender: String,
    /// Simulated status.
    pub status: ExecutionStatus,
    /// Simulated gas.
    pub gas: GasSummary,
    /// Number of events the call would emit.
    pub event_count: u64,
    /// Base64 transaction bytes, ready to hand to a wallet for signing.
    pub tx_bytes: String,
}

impl SimulationOutcome {
    /// Whether the dry-run succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }

    /// Turns a failed dry-run into [`LoginKitError::SimulationFailed`], for callers
    /// that will not sign a transaction known to abort.
    ///
    /// # Errors
    /// `SimulationFailed` when the status is not success.
    pub fn into_result(self) -> Result<Self, LoginKitError> {
        if let ExecutionStatus::Failure { error } = &self.status {
            return Err(LoginKitError::SimulationFailed {
                error: error.clone(),
            });
        }
        Ok(self)
    }
}

/// Receipt of a transaction the wallet signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ExecutionReceipt {
    /// Transaction digest.
    pub digest: String,
    /// Executed status.
    pub status: ExecutionStatus,
}

/// A built transaction handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SigningRequest {
    /// `package::module::function` being called.
    pub target: String,
    /// Address that must sign.
    pub sender: String,
    /// Base64 transaction bytes, as dry-run.
    pub tx_bytes: String,
    /// Gas budget the bytes were built with.
    pub gas_budget: u64,
}

impl SigningRequest {
    /// Request for `transaction`, built into `tx_bytes`.
    #[must_use]
    pub fn new(transaction: &PendingTransaction, tx_bytes: String) -> Self {
        Self {
            target: transaction.target.to_string(),
            sender: transaction.sender.to_string(),
            tx_bytes,
            gas_budget: transaction.gas_budget,
        }
    }
}

/// The wallet collaborator: signs and submits transactions the bridge prepared.
/// Implemented by the host application.
#[uniffi::export(with_foreign)]
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Asks the wallet to sign and execute `request`.
    ///
    /// # Errors
    /// Whatever the wallet reports (rejected by the user, network, ...).
    async fn sign_and_execute(
        &self,
        request: SigningRequest,
    ) -> Result<ExecutionReceipt, LoginKitError>;
}

/// Whether `s` is a valid move identifier.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        Some('_') if s.len() > 1 => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Assembles move calls against one package/module and dry-runs them.
#[derive(Clone)]
pub struct TransactionBuilder {
    ledger: Arc<dyn LedgerRpc>,
    package: ObjectId,
    module: String,
    gas_budget: u64,
}

impl TransactionBuilder {
    /// Creates a builder for calls into `package::module`.
    ///
    /// # Errors
    /// `InvalidInput` if the package id or module name are malformed.
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        package: &str,
        module: &str,
        gas_budget: u64,
    ) -> Result<Self, LoginKitError> {
        let package = ObjectId::parse_from_ffi(package, "package_id")?;
        if !is_identifier(module) {
            return Err(LoginKitError::InvalidInput {
                attribute: "module".to_string(),
                reason: format!("{module} is not a valid identifier"),
            });
        }
        Ok(Self {
            ledger,
            package,
            module: module.to_string(),
            gas_budget,
        })
    }

    /// Resolves an entry point. A bare function name is looked up in the builder's
    /// module; `package::module::function` is taken as is.
    ///
    /// # Errors
    /// `InvalidInput` if the entry point is malformed.
    pub fn target(&self, entry_point: &str) -> Result<MoveTarget, LoginKitError> {
        let invalid = |reason: &str| LoginKitError::InvalidInput {
            attribute: "entry_point".to_string(),
            reason: format!("{entry_point}: {reason}"),
        };
        let parts: Vec<&str> = entry_point.split("::").collect();
        let (package, module, function) = match parts.as_slice() {
            [function] => (self.package, self.module.clone(), *function),
            [package, module, function] => (
                ObjectId::from_str(package).map_err(|e| invalid(&e))?,
                (*module).to_string(),
                *function,
            ),
            _ => return Err(invalid("expected function or package::module::function")),
        };
        if !is_identifier(&module) || !is_identifier(function) {
            return Err(invalid("not a valid identifier"));
        }
        Ok(MoveTarget {
            package,
            module,
            function: function.to_string(),
        })
    }

    /// Validates the inputs and assembles a [`PendingTransaction`].
    ///
    /// Every object argument has to appear in `referenced_objects`.
    ///
    /// # Errors
    /// `InvalidInput` naming the offending attribute.
    pub fn prepare(
        &self,
        entry_point: &str,
        args: Vec<CallArg>,
        sender: &str,
        referenced_objects: &[String],
    ) -> Result<PendingTransaction, LoginKitError> {
        let target = self.target(entry_point)?;
        let sender = LedgerAddress::parse_from_ffi(sender, "sender")?;

        let mut referenced = Vec::with_capacity(referenced_objects.len());
        for id in referenced_objects {
            let id = ObjectId::parse_from_ffi(id, "referenced_objects")?;
            if !referenced.contains(&id) {
                referenced.push(id);
            }
        }
        let known: HashSet<ObjectId> = referenced.iter().copied().collect();

        let arguments = args
            .into_iter()
            .map(|arg| match arg {
                CallArg::Object { id } => {
                    let id = ObjectId::parse_from_ffi(&id, "args")?;
                    if !known.contains(&id) {
                        return Err(LoginKitError::InvalidInput {
                            attribute: "args".to_string(),
                            reason: format!("object {id} is not in referenced_objects"),
                        });
                    }
                    Ok(ResolvedArg::Object(id))
                }
                CallArg::Pure {
                    value: PureArg::Address { value },
                } => {
                    let address = LedgerAddress::parse_from_ffi(&value, "args")?;
                    Ok(ResolvedArg::Pure(PureArg::Address {
                        value: address.to_string(),
                    }))
                }
                CallArg::Pure { value } => Ok(ResolvedArg::Pure(value)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PendingTransaction {
            target,
            arguments,
            sender,
            referenced_objects: referenced,
            gas_budget: self.gas_budget,
        })
    }

    /// Has the ledger build the transaction bytes, then dry-runs them.
    ///
    /// A sender without gas cannot have bytes built. That is reported as a failed
    /// outcome with no bytes and no gas, like a dry-run that runs out of gas.
    ///
    /// # Errors
    /// Network or RPC failures. A failing dry-run is returned as an outcome.
    pub async fn simulate(
        &self,
        transaction: &PendingTransaction,
    ) -> Result<SimulationOutcome, LoginKitError> {
        let tx_bytes = match self.ledger.build_move_call(transaction).await {
            Ok(tx_bytes) => tx_bytes,
            Err(LoginKitError::Rpc { message, .. }) if is_gas_selection_message(&message) => {
                log::warn!(
                    "{} cannot be built for {}: {message}",
                    transaction.target,
                    transaction.sender
                );
                return Ok(SimulationOutcome {
                    target: transaction.target.to_string(),
                    sender: transaction.sender.to_string(),
                    status: ExecutionStatus::Failure { error: message },
                    gas: GasSummary::default(),
                    event_count: 0,
                    tx_bytes: String::new(),
                });
            }
            Err(err) => return Err(err),
        };
        let dry_run = self.ledger.dry_run(&tx_bytes).await?;

        match &dry_run.status {
            ExecutionStatus::Success => {
                log::debug!("dry-run of {} succeeded", transaction.target);
            }
            ExecutionStatus::Failure { error } => {
                log::warn!("dry-run of {} reported failure: {error}", transaction.target);
            }
        }

        Ok(SimulationOutcome {
            target: transaction.target.to_string(),
            sender: transaction.sender.to_string(),
            status: dry_run.status,
            gas: dry_run.gas,
            event_count: dry_run.event_count,
            tx_bytes,
        })
    }

    /// [`Self::prepare`] followed by [`Self::simulate`].
    ///
    /// # Errors
    /// Invalid input, network or RPC failures.
    pub async fn build_and_simulate(
        &self,
        entry_point: &str,
        args: Vec<CallArg>,
        sender: &str,
        referenced_objects: &[String],
    ) -> Result<SimulationOutcome, LoginKitError> {
        let transaction = self.prepare(entry_point, args, sender, referenced_objects)?;
        self.simulate(&transaction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::StaticLedger;

    const PACKAGE: &str = "0x83fb80f87901b93ceef7d5a3180a1aa48254c88a9f7b14eb2bf74a8c2f94e701";
    const SENDER: &str = "0x42dd208590e5958a16488cbc771dd324a4a5b0cd34eafaaf28e4ad351d36684f";

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new(Arc::new(StaticLedger { epoch: Some(1) }), PACKAGE, "auth", 1000)
            .unwrap()
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("login_with_zk"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("_"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("with-dash"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_bare_function_uses_builder_module() {
        let target = builder().target("login_with_zk").unwrap();
        assert_eq!(target.to_string(), format!("{PACKAGE}::auth::login_with_zk"));
    }

    #[test]
    fn test_qualified_target() {
        let target = builder().target("0x2::coin::split").unwrap();
        assert_eq!(target.module, "coin");
        assert_eq!(target.package, ObjectId::from_str("0x2").unwrap());
        assert!(builder().target("auth::login").is_err());
    }

    #[test]
    fn test_prepare_keeps_argument_order_and_sender() {
        let tx = builder()
            .prepare(
                "login_with_zk",
                vec![
                    CallArg::object("0xaa"),
                    CallArg::string("tok"),
                    CallArg::u64(7),
                    CallArg::object("0x6"),
                ],
                SENDER,
                &["0xaa".to_string(), "0x6".to_string(), "0xaa".to_string()],
            )
            .unwrap();

        assert_eq!(tx.sender.to_string(), SENDER);
        assert_eq!(tx.referenced_objects.len(), 2);
        let json: Vec<Value> = tx.arguments.iter().map(ResolvedArg::to_json).collect();
        assert_eq!(
            json[0],
            json!("0x00000000000000000000000000000000000000000000000000000000000000aa")
        );
        assert_eq!(json[1], json!("tok"));
        assert_eq!(json[2], json!("7"));
        assert_eq!(tx.gas_budget, 1000);
    }

    #[test]
    fn test_unreferenced_object_is_rejected() {
        let err = builder()
            .prepare("f", vec![CallArg::object("0xbb")], SENDER, &[])
            .unwrap_err();
        assert!(matches!(err, LoginKitError::InvalidInput { ref attribute, .. } if attribute == "args"));
    }

    #[test]
    fn test_sender_must_be_an_address() {
        let err = builder().prepare("f", vec![], "0xTEST", &[]).unwrap_err();
        assert!(
            matches!(err, LoginKitError::InvalidInput { ref attribute, .. } if attribute == "sender")
        );
    }

    #[test]
    fn test_outcome_into_result() {
        let outcome = SimulationOutcome {
            target: "t".to_string(),
            sender: SENDER.to_string(),
            status: ExecutionStatus::Failure {
                error: "InsufficientGas".to_string(),
            },
            gas: GasSummary::default(),
            event_count: 0,
            tx_bytes: String::new(),
        };
        assert!(!outcome.is_success());
        assert!(matches!(
            outcome.into_result(),
            Err(LoginKitError::SimulationFailed { error }) if error == "InsufficientGas"
        ));
    }

    #[test]
    fn test_signing_request_carries_the_built_call() {
        let tx = builder()
            .prepare("init_registry", vec![], SENDER, &[])
            .unwrap();
        let request = SigningRequest::new(&tx, "AAEC".to_string());
        assert_eq!(request.target, format!("{PACKAGE}::auth::init_registry"));
        assert_eq!(request.sender, SENDER);
        assert_eq!(request.tx_bytes, "AAEC");
        assert_eq!(request.gas_budget, 1000);
    }

    #[test]
    fn test_net_cost_saturates() {
        let gas = GasSummary {
            computation_cost: 10,
            storage_cost: 5,
            storage_rebate: 100,
        };
        assert_eq!(gas.net_cost(), 0);
    }
}
