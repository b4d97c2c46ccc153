use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monthly basic deduction (减除费用), scaled by the accumulated month count
pub const BASIC_DEDUCTION: Decimal = dec!(5000);

/// One band of the seven-level progressive rate table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBracket {
    /// Inclusive upper bound of accumulated taxable income; `None` for the top band
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    /// Quick deduction (速算扣除数)
    pub quick_deduction: Decimal,
}

pub const BRACKETS: [TaxBracket; 7] = [
    TaxBracket {
        upper_bound: Some(dec!(36000)),
        rate: dec!(0.03),
        quick_deduction: dec!(0.00),
    },
    TaxBracket {
        upper_bound: Some(dec!(144000)),
        rate: dec!(0.10),
        quick_deduction: dec!(2520.00),
    },
    TaxBracket {
        upper_bound: Some(dec!(300000)),
        rate: dec!(0.20),
        quick_deduction: dec!(16920.00),
    },
    TaxBracket {
        upper_bound: Some(dec!(420000)),
        rate: dec!(0.25),
        quick_deduction: dec!(31920.00),
    },
    TaxBracket {
        upper_bound: Some(dec!(660000)),
        rate: dec!(0.30),
        quick_deduction: dec!(52920.00),
    },
    TaxBracket {
        upper_bound: Some(dec!(960000)),
        rate: dec!(0.35),
        quick_deduction: dec!(85920.00),
    },
    TaxBracket {
        upper_bound: None,
        rate: dec!(0.45),
        quick_deduction: dec!(181920.00),
    },
];

impl TaxBracket {
    /// Bracket for an accumulated taxable income. Negative input is treated as zero.
    pub fn for_taxable_income(taxable: Decimal) -> TaxBracket {
        let taxable = taxable.max(Decimal::ZERO);
        BRACKETS
            .iter()
            .find(|b| b.upper_bound.is_none_or(|upper| taxable <= upper))
            .copied()
            .unwrap_or(BRACKETS[BRACKETS.len() - 1])
    }

    /// `taxable × rate − quick_deduction`, floored at zero
    pub fn tax_on(&self, taxable: Decimal) -> Decimal {
        (taxable * self.rate - self.quick_deduction).max(Decimal::ZERO)
    }
}

/// Kind of income a payment represents, which decides how much of it is taxable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum IncomeType {
    /// 劳务报酬: 80% of the billed amount counts as income
    #[default]
    Labor,
    /// 工资薪金: the whole billed amount counts as income
    Wages,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown income type {0} (expected 1 = labor remuneration, 2 = wages)")]
pub struct UnknownIncomeType(pub u8);

impl IncomeType {
    pub fn code(self) -> u8 {
        match self {
            IncomeType::Labor => 1,
            IncomeType::Wages => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IncomeType::Labor => "劳务报酬",
            IncomeType::Wages => "工资薪金",
        }
    }

    /// Share of the billed amount that counts as income
    pub fn income_ratio(self) -> Decimal {
        match self {
            IncomeType::Labor => dec!(0.8),
            IncomeType::Wages => Decimal::ONE,
        }
    }
}

impl TryFrom<u8> for IncomeType {
    type Error = UnknownIncomeType;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(IncomeType::Labor),
            2 => Ok(IncomeType::Wages),
            other => Err(UnknownIncomeType(other)),
        }
    }
}

impl From<IncomeType> for u8 {
    fn from(income_type: IncomeType) -> Self {
        income_type.code()
    }
}

impl fmt::Display for IncomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
