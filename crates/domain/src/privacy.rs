use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabula_core::{AppError, AppResult};

/// Fixed privacy taxonomy assigned to columns by data contracts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyClassification {
    /// No privacy classification.
    #[default]
    None,
    /// Direct personal identifier.
    Pii,
    /// Indirect identifier that re-identifies in combination.
    QuasiPii,
    /// Special-category data.
    Special,
    /// Criminal offence data.
    Criminal,
    /// Data relating to minors.
    Child,
    /// Personal financial data.
    FinancialPii,
    /// Payment-card data.
    Pci,
    /// Credentials and secrets.
    Auth,
    /// Location data.
    Location,
    /// Behavioural tracking identifiers.
    Tracking,
    /// Employment records.
    Hr,
    /// Commercially sensitive data.
    Commercial,
    /// Trade secrets and intellectual property.
    Ip,
}

impl PrivacyClassification {
    /// Returns the stable wire value for this classification.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pii => "pii",
            Self::QuasiPii => "quasi_pii",
            Self::Special => "special",
            Self::Criminal => "criminal",
            Self::Child => "child",
            Self::FinancialPii => "financial_pii",
            Self::Pci => "pci",
            Self::Auth => "auth",
            Self::Location => "location",
            Self::Tracking => "tracking",
            Self::Hr => "hr",
            Self::Commercial => "commercial",
            Self::Ip => "ip",
        }
    }

    /// Returns the masking strategy applied when a column requests none.
    #[must_use]
    pub fn default_strategy(&self) -> MaskingStrategy {
        match self {
            Self::Pii | Self::FinancialPii | Self::Tracking | Self::Hr => MaskingStrategy::Hash,
            Self::QuasiPii | Self::Location => MaskingStrategy::Partial,
            Self::Special | Self::Criminal | Self::Child | Self::Pci | Self::Auth => {
                MaskingStrategy::Redact
            }
            Self::None | Self::Commercial | Self::Ip => MaskingStrategy::None,
        }
    }

    /// Returns whether a per-column strategy may override the default.
    ///
    /// The override permission is a fixed set, not configurable.
    #[must_use]
    pub fn allows_override(&self) -> bool {
        matches!(self, Self::QuasiPii)
    }
}

impl FromStr for PrivacyClassification {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "pii" => Ok(Self::Pii),
            "quasi_pii" => Ok(Self::QuasiPii),
            "special" => Ok(Self::Special),
            "criminal" => Ok(Self::Criminal),
            "child" => Ok(Self::Child),
            "financial_pii" => Ok(Self::FinancialPii),
            "pci" => Ok(Self::Pci),
            "auth" => Ok(Self::Auth),
            "location" => Ok(Self::Location),
            "tracking" => Ok(Self::Tracking),
            "hr" => Ok(Self::Hr),
            "commercial" => Ok(Self::Commercial),
            "ip" => Ok(Self::Ip),
            _ => Err(AppError::Validation(format!(
                "unknown privacy classification '{value}'"
            ))),
        }
    }
}

/// Fixed set of masking transformations the platform can express.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStrategy {
    /// Leave values unmasked.
    #[default]
    None,
    /// Replace the value with its SHA-256 digest.
    Hash,
    /// Replace the value with a fixed redaction marker.
    Redact,
    /// Keep a short prefix and blank the rest.
    Partial,
    /// Replace the value with NULL.
    Nullify,
    /// Keep the first character and the mail domain.
    MaskEmail,
    /// Keep the outward part of a postcode.
    MaskPostcode,
}

impl MaskingStrategy {
    /// Returns the stable wire value for this strategy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hash => "hash",
            Self::Redact => "redact",
            Self::Partial => "partial",
            Self::Nullify => "nullify",
            Self::MaskEmail => "mask_email",
            Self::MaskPostcode => "mask_postcode",
        }
    }
}

impl FromStr for MaskingStrategy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "hash" => Ok(Self::Hash),
            "redact" => Ok(Self::Redact),
            "partial" => Ok(Self::Partial),
            "nullify" => Ok(Self::Nullify),
            "mask_email" => Ok(Self::MaskEmail),
            "mask_postcode" => Ok(Self::MaskPostcode),
            _ => Err(AppError::Validation(format!(
                "unknown masking strategy '{value}'"
            ))),
        }
    }
}

/// Per-column privacy metadata declared by a data contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPrivacyMetadata {
    #[serde(rename = "name")]
    column_name: String,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    classification: PrivacyClassification,
    #[serde(default, rename = "masking_strategy", skip_serializing_if = "Option::is_none")]
    requested_strategy: Option<MaskingStrategy>,
    #[serde(default, rename = "primary_key")]
    is_primary_key: bool,
}

impl ColumnPrivacyMetadata {
    /// Creates validated column privacy metadata.
    pub fn new(
        column_name: impl Into<String>,
        data_type: impl Into<String>,
        classification: PrivacyClassification,
        requested_strategy: Option<MaskingStrategy>,
        is_primary_key: bool,
    ) -> AppResult<Self> {
        let column_name = column_name.into();
        let data_type = data_type.into();
        if column_name.trim().is_empty() {
            return Err(AppError::Validation(
                "column privacy metadata requires a column name".to_owned(),
            ));
        }
        if data_type.trim().is_empty() {
            return Err(AppError::Validation(
                "column privacy metadata requires a data type".to_owned(),
            ));
        }

        Ok(Self {
            column_name,
            data_type,
            classification,
            requested_strategy,
            is_primary_key,
        })
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.column_name.as_str()
    }

    /// Returns the platform data type of the column.
    #[must_use]
    pub fn data_type(&self) -> &str {
        self.data_type.as_str()
    }

    /// Returns the declared privacy classification.
    #[must_use]
    pub fn classification(&self) -> PrivacyClassification {
        self.classification
    }

    /// Returns the per-column strategy override request, if any.
    #[must_use]
    pub fn requested_strategy(&self) -> Option<MaskingStrategy> {
        self.requested_strategy
    }

    /// Returns whether the column is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    /// Resolves the strategy that actually applies to this column.
    ///
    /// Primary-key columns are never masked: masking a join key breaks
    /// referential integrity downstream. A requested override is honoured
    /// only for classifications that permit one.
    #[must_use]
    pub fn effective_masking_strategy(&self) -> MaskingStrategy {
        if self.is_primary_key {
            return MaskingStrategy::None;
        }

        if let Some(requested) = self.requested_strategy
            && self.classification.allows_override()
        {
            return requested;
        }

        self.classification.default_strategy()
    }

    /// Returns whether this column needs a masking policy.
    #[must_use]
    pub fn requires_masking(&self) -> bool {
        self.effective_masking_strategy() != MaskingStrategy::None
    }
}

/// Input for [`MaskingIntent::new`].
#[derive(Debug, Clone)]
pub struct MaskingIntentInput {
    /// Table the masked column belongs to.
    pub table: String,
    /// Column to mask.
    pub column_name: String,
    /// Platform data type of the column.
    pub column_type: String,
    /// Classification driving the strategy.
    pub classification: PrivacyClassification,
    /// Effective masking strategy, never `none`.
    pub strategy: MaskingStrategy,
    /// Identity groups permitted to read unmasked values.
    pub exempt_groups: Vec<String>,
    /// Why this intent exists.
    pub reason: String,
}

/// A masking policy a column should carry, per declared intent.
///
/// Exempt groups are stored sorted and deduplicated so that rendered
/// policies are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskingIntent {
    table: String,
    column_name: String,
    column_type: String,
    classification: PrivacyClassification,
    strategy: MaskingStrategy,
    exempt_groups: BTreeSet<String>,
    reason: String,
}

impl MaskingIntent {
    /// Creates a validated masking intent.
    pub fn new(input: MaskingIntentInput) -> AppResult<Self> {
        if input.table.trim().is_empty() || input.column_name.trim().is_empty() {
            return Err(AppError::Validation(
                "masking intent requires a table and a column name".to_owned(),
            ));
        }
        if input.column_type.trim().is_empty() {
            return Err(AppError::Validation(
                "masking intent requires a column type".to_owned(),
            ));
        }
        if input.strategy == MaskingStrategy::None {
            return Err(AppError::Validation(format!(
                "masking intent for column '{}' requires an effective strategy",
                input.column_name
            )));
        }

        Ok(Self {
            table: input.table,
            column_name: input.column_name,
            column_type: input.column_type,
            classification: input.classification,
            strategy: input.strategy,
            exempt_groups: input.exempt_groups.into_iter().collect(),
            reason: input.reason,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.column_name.as_str()
    }

    /// Returns the platform data type of the column.
    #[must_use]
    pub fn column_type(&self) -> &str {
        self.column_type.as_str()
    }

    /// Returns the classification driving this intent.
    #[must_use]
    pub fn classification(&self) -> PrivacyClassification {
        self.classification
    }

    /// Returns the effective masking strategy.
    #[must_use]
    pub fn strategy(&self) -> MaskingStrategy {
        self.strategy
    }

    /// Returns the identity groups exempt from masking, in sorted order.
    #[must_use]
    pub fn exempt_groups(&self) -> &BTreeSet<String> {
        &self.exempt_groups
    }

    /// Returns the reason this intent exists.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }
}

/// A masking expression currently bound to a column, as observed.
///
/// Columns without a bound mask produce no observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedMask {
    table: String,
    column_name: String,
    expression: String,
}

impl ObservedMask {
    /// Creates a validated observed mask.
    pub fn new(
        table: impl Into<String>,
        column_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> AppResult<Self> {
        let table = table.into();
        let column_name = column_name.into();
        let expression = expression.into();
        if table.trim().is_empty() || column_name.trim().is_empty() {
            return Err(AppError::Validation(
                "observed mask requires a table and a column name".to_owned(),
            ));
        }
        if expression.trim().is_empty() {
            return Err(AppError::Validation(
                "observed mask requires a masking expression".to_owned(),
            ));
        }

        Ok(Self {
            table,
            column_name,
            expression,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        self.column_name.as_str()
    }

    /// Returns the bound masking expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        self.expression.as_str()
    }
}

/// One required masking change for a column.
///
/// The two directions carry different payloads, so a delta can never pair a
/// drop with a strategy or a create with an observed expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskingDelta {
    /// Assert the masking function and column binding for an intent.
    ///
    /// Creates are emitted unconditionally for every intent, even when an
    /// equivalent mask is already bound: re-asserting keeps the function
    /// body and exemption list current without comparing expressions.
    Create {
        /// Table the masked column belongs to.
        table: String,
        /// Column to mask.
        column_name: String,
        /// Platform data type of the column.
        column_type: String,
        /// Classification driving the strategy.
        classification: PrivacyClassification,
        /// Masking strategy to render.
        strategy: MaskingStrategy,
        /// Identity groups permitted to read unmasked values.
        exempt_groups: BTreeSet<String>,
        /// Why the mask is required.
        reason: String,
    },
    /// Remove a bound mask that no declared intent backs.
    Drop {
        /// Table the masked column belongs to.
        table: String,
        /// Column currently masked.
        column_name: String,
        /// Expression currently bound to the column.
        current_expression: String,
        /// Why the mask is removed.
        reason: String,
    },
}

impl MaskingDelta {
    /// Creates a re-assert delta from a masking intent.
    #[must_use]
    pub fn create(intent: &MaskingIntent) -> Self {
        Self::Create {
            table: intent.table().to_owned(),
            column_name: intent.column_name().to_owned(),
            column_type: intent.column_type().to_owned(),
            classification: intent.classification(),
            strategy: intent.strategy(),
            exempt_groups: intent.exempt_groups().clone(),
            reason: intent.reason().to_owned(),
        }
    }

    /// Creates a removal delta from an observed mask.
    #[must_use]
    pub fn drop_mask(observed: &ObservedMask, reason: impl Into<String>) -> Self {
        Self::Drop {
            table: observed.table().to_owned(),
            column_name: observed.column_name().to_owned(),
            current_expression: observed.expression().to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns the action verb for this delta.
    #[must_use]
    pub fn action_str(&self) -> &'static str {
        match self {
            Self::Create { .. } => "CREATE",
            Self::Drop { .. } => "DROP",
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Create { table, .. } | Self::Drop { table, .. } => table.as_str(),
        }
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        match self {
            Self::Create { column_name, .. } | Self::Drop { column_name, .. } => {
                column_name.as_str()
            }
        }
    }

    /// Renders a short human-readable description of this change.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Create {
                table,
                column_name,
                strategy,
                ..
            } => format!(
                "CREATE {} mask on '{}.{}'",
                strategy.as_str(),
                table,
                column_name
            ),
            Self::Drop {
                table, column_name, ..
            } => format!("DROP mask on '{table}.{column_name}'"),
        }
    }
}
