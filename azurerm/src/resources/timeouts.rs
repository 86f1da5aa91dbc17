//! Per-operation time limits configured through a `timeouts` block
//!
//! Durations use the Terraform spelling: a sequence of integers suffixed with
//! `h`, `m` or `s`, such as `60m` or `1h30m`.

use std::future::Future;
use std::time::Duration;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tfplug::validator::FnValidator;

use super::common::attr;

const BLOCK: &str = "timeouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    fn attribute(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Operation::Create => "creating",
            Operation::Read => "reading",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
        }
    }
}

const OPERATIONS: [Operation; 4] = [
    Operation::Create,
    Operation::Read,
    Operation::Update,
    Operation::Delete,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timeouts {
    create: Duration,
    read: Duration,
    update: Duration,
    delete: Duration,
}

impl Timeouts {
    pub const fn minutes(create: u64, read: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(read * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Defaults overridden by the `timeouts` block of a config or state
    pub fn configured(self, value: &DynamicValue) -> Self {
        let Some(block) = value.get_block(&attr(BLOCK)) else {
            return self;
        };
        let pick = |operation: Operation| {
            block
                .get_optional_string(&attr(operation.attribute()))
                .and_then(|v| parse_duration(&v).ok())
                .unwrap_or(self.get(operation))
        };

        Self {
            create: pick(Operation::Create),
            read: pick(Operation::Read),
            update: pick(Operation::Update),
            delete: pick(Operation::Delete),
        }
    }

    /// Schema of the `timeouts` block, documenting these defaults
    pub fn block(&self) -> NestedBlock {
        let mut builder = NestedBlockBuilder::single_list(BLOCK).max_items(1);
        for operation in OPERATIONS {
            let description = format!(
                "Time allowed for {} the resource, default {}",
                operation.verb(),
                format_duration(self.get(operation))
            );
            builder = builder.attribute(
                AttributeBuilder::new(operation.attribute(), AttributeType::String)
                    .description(&description)
                    .optional()
                    .validator(FnValidator::create(
                        "value must be a duration such as 30m or 1h30m",
                        duration,
                    ))
                    .build(),
            );
        }
        builder.build()
    }

    /// Runs `future`, giving up once the limit for `operation` passes
    pub async fn run<F: Future>(
        &self,
        operation: Operation,
        what: &str,
        future: F,
    ) -> Result<F::Output, Diagnostic> {
        let limit = self.get(operation);
        tokio::time::timeout(limit, future).await.map_err(|_| {
            Diagnostic::error(
                "Operation timed out",
                format!(
                    "{} {} did not complete within {}",
                    operation.verb(),
                    what,
                    format_duration(limit)
                ),
            )
        })
    }
}

fn duration(value: &str) -> Result<(), String> {
    parse_duration(value).map(|_| ())
}

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    let invalid = || format!("{:?} is not a duration such as 30m or 1h30m", value);
    if value.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total))
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s % 3600 == 0 && s > 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 && s > 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{block, object};
    use tfplug::types::Dynamic;

    const DEFAULTS: Timeouts = Timeouts::minutes(60, 5, 60, 60);

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("60m"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("2h0m10s"), Ok(Duration::from_secs(7210)));

        for invalid in ["", "60", "m", "1d", "1.5h", "-5m", "10 m"] {
            assert!(parse_duration(invalid).is_err(), "{:?} should be invalid", invalid);
        }
    }

    #[test]
    fn durations_format_in_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    }

    #[test]
    fn configured_block_overrides_defaults() {
        let config = object(&[(
            "timeouts",
            block(&[
                ("create", "2h".into()),
                ("read", Dynamic::Null),
                ("update", "not-a-duration".into()),
            ]),
        )]);

        let timeouts = DEFAULTS.configured(&config);
        assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(7200));
        assert_eq!(timeouts.get(Operation::Read), Duration::from_secs(300));
        assert_eq!(timeouts.get(Operation::Update), Duration::from_secs(3600));
        assert_eq!(timeouts.get(Operation::Delete), Duration::from_secs(3600));

        let unset = object(&[("timeouts", Dynamic::List(vec![]))]);
        assert_eq!(DEFAULTS.configured(&unset), DEFAULTS);
    }

    #[test]
    fn block_documents_defaults() {
        let block = DEFAULTS.block();
        assert_eq!(block.max_items, 1);
        let read = block.block.attribute("read").unwrap();
        assert!(read.optional);
        assert!(read.description.contains("default 5m"));
    }

    #[tokio::test]
    async fn run_gives_up_after_the_limit() {
        let limit = Duration::from_millis(20);
        let timeouts = Timeouts {
            create: limit,
            read: limit,
            update: limit,
            delete: limit,
        };

        let finished = timeouts.run(Operation::Read, "widget", async { 7 }).await;
        assert_eq!(finished.unwrap(), 7);

        let stalled = timeouts
            .run(Operation::Delete, "widget", std::future::pending::<()>())
            .await;
        let diagnostic = stalled.unwrap_err();
        assert_eq!(diagnostic.summary, "Operation timed out");
        assert!(diagnostic.detail.starts_with("deleting widget did not complete"));
    }
}
