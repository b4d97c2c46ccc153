use super::brackets::IncomeType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-calculation settings for one person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxOptions {
    #[serde(default)]
    pub income_type: IncomeType,
    /// Monthly special deduction (专项扣除)
    #[serde(default)]
    pub special_deduction: Decimal,
    /// Monthly additional special deduction (专项附加扣除)
    #[serde(default)]
    pub additional_special_deduction: Decimal,
    /// Monthly other deduction (其他扣除)
    #[serde(default)]
    pub other_deduction: Decimal,
    /// Monthly personal pension deduction (个人养老金)
    #[serde(default)]
    pub pension_deduction: Decimal,
    /// Deductible donations (捐赠), applied once rather than per month
    #[serde(default)]
    pub donation_deduction: Decimal,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub worker_id: Option<i64>,
}

impl TaxOptions {
    pub fn new(income_type: IncomeType) -> Self {
        TaxOptions {
            income_type,
            ..Default::default()
        }
    }

    /// Copy with every deduction clamped at zero
    pub fn sanitized(&self) -> TaxOptions {
        let clamp = |d: Decimal| d.max(Decimal::ZERO);
        TaxOptions {
            special_deduction: clamp(self.special_deduction),
            additional_special_deduction: clamp(self.additional_special_deduction),
            other_deduction: clamp(self.other_deduction),
            pension_deduction: clamp(self.pension_deduction),
            donation_deduction: clamp(self.donation_deduction),
            ..self.clone()
        }
    }

    /// Same settings, labelled for another person
    pub fn for_person(&self, realname: &str, worker_id: Option<i64>) -> TaxOptions {
        TaxOptions {
            realname: (!realname.is_empty()).then(|| realname.to_string()),
            worker_id: worker_id.or(self.worker_id),
            ..self.clone()
        }
    }

    pub fn realname_filter(&self) -> Option<&str> {
        self.realname.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Narrows a batch calculation to one person, or names the person when no batch is given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFilter {
    pub credential_num: Option<String>,
    pub realname: Option<String>,
}

impl PersonFilter {
    #[cfg(test)]
    pub fn credential(credential_num: impl Into<String>) -> Self {
        PersonFilter {
            credential_num: Some(credential_num.into()),
            realname: None,
        }
    }

    pub fn credential_num(&self) -> Option<&str> {
        non_blank(self.credential_num.as_deref())
    }

    pub fn realname(&self) -> Option<&str> {
        non_blank(self.realname.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sanitized_clamps_negative_deductions() {
        let options = TaxOptions {
            special_deduction: dec!(-100),
            pension_deduction: dec!(200),
            donation_deduction: dec!(-1),
            ..TaxOptions::new(IncomeType::Wages)
        }
        .sanitized();
        assert_eq!(options.special_deduction, Decimal::ZERO);
        assert_eq!(options.pension_deduction, dec!(200));
        assert_eq!(options.donation_deduction, Decimal::ZERO);
        assert_eq!(options.income_type, IncomeType::Wages);
    }

    #[test]
    fn for_person_relabels() {
        let base = TaxOptions {
            worker_id: Some(1),
            ..Default::default()
        };
        let person = base.for_person("赵六", Some(9));
        assert_eq!(person.realname.as_deref(), Some("赵六"));
        assert_eq!(person.worker_id, Some(9));
        assert_eq!(base.for_person("", None).realname, None);
        assert_eq!(base.for_person("", None).worker_id, Some(1));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = PersonFilter {
            credential_num: Some("  ".to_string()),
            realname: Some(" 张三 ".to_string()),
        };
        assert_eq!(filter.credential_num(), None);
        assert_eq!(filter.realname(), Some("张三"));
    }
}
