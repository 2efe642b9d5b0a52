//! Calendar enumerations used to place plans and tasks
//!
//! Each enum carries its ordinal (`order()`), which is the value persisted in
//! the denormalized `month_order`, `week_order` and `day_order` columns.

use serde::{Deserialize, Serialize};

/// Month of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "month", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

text_enum!(Month, "month", {
    January => "JANUARY",
    February => "FEBRUARY",
    March => "MARCH",
    April => "APRIL",
    May => "MAY",
    June => "JUNE",
    July => "JULY",
    August => "AUGUST",
    September => "SEPTEMBER",
    October => "OCTOBER",
    November => "NOVEMBER",
    December => "DECEMBER",
});

impl Month {
    /// 1 for January through 12 for December
    pub fn order(&self) -> i32 {
        *self as i32 + 1
    }

    pub fn from_order(order: i32) -> Option<Self> {
        usize::try_from(order - 1)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

/// Week of the month a plan covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "week")]
pub enum Week {
    #[serde(rename = "WEEK_1")]
    #[sqlx(rename = "WEEK_1")]
    Week1,
    #[serde(rename = "WEEK_2")]
    #[sqlx(rename = "WEEK_2")]
    Week2,
    #[serde(rename = "WEEK_3")]
    #[sqlx(rename = "WEEK_3")]
    Week3,
    #[serde(rename = "WEEK_4")]
    #[sqlx(rename = "WEEK_4")]
    Week4,
    #[serde(rename = "WEEK_5")]
    #[sqlx(rename = "WEEK_5")]
    Week5,
}

text_enum!(Week, "week", {
    Week1 => "WEEK_1",
    Week2 => "WEEK_2",
    Week3 => "WEEK_3",
    Week4 => "WEEK_4",
    Week5 => "WEEK_5",
});

impl Week {
    /// 1 for WEEK_1 through 5 for WEEK_5
    pub fn order(&self) -> i32 {
        *self as i32 + 1
    }

    pub fn from_order(order: i32) -> Option<Self> {
        usize::try_from(order - 1)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

/// Working day a task is planned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "day", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

text_enum!(Day, "day", {
    Monday => "MONDAY",
    Tuesday => "TUESDAY",
    Wednesday => "WEDNESDAY",
    Thursday => "THURSDAY",
    Friday => "FRIDAY",
});

impl Day {
    /// 1 for Monday through 5 for Friday
    pub fn order(&self) -> i32 {
        *self as i32 + 1
    }

    pub fn from_order(order: i32) -> Option<Self> {
        usize::try_from(order - 1)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// The working day of a calendar date, `None` on weekends
    pub fn from_weekday(weekday: chrono::Weekday) -> Option<Self> {
        match weekday {
            chrono::Weekday::Mon => Some(Day::Monday),
            chrono::Weekday::Tue => Some(Day::Tuesday),
            chrono::Weekday::Wed => Some(Day::Wednesday),
            chrono::Weekday::Thu => Some(Day::Thursday),
            chrono::Weekday::Fri => Some(Day::Friday),
            chrono::Weekday::Sat | chrono::Weekday::Sun => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_follow_declaration() {
        assert_eq!(Month::January.order(), 1);
        assert_eq!(Month::December.order(), 12);
        assert_eq!(Week::Week1.order(), 1);
        assert_eq!(Week::Week5.order(), 5);
        assert_eq!(Day::Monday.order(), 1);
        assert_eq!(Day::Friday.order(), 5);
    }

    #[test]
    fn test_from_order() {
        for month in Month::ALL {
            assert_eq!(Month::from_order(month.order()), Some(*month));
        }
        assert_eq!(Month::from_order(0), None);
        assert_eq!(Week::from_order(6), None);
        assert_eq!(Day::from_order(3), Some(Day::Wednesday));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("january".parse::<Month>().unwrap(), Month::January);
        assert_eq!("WEEK_3".parse::<Week>().unwrap(), Week::Week3);
        assert_eq!(" friday ".parse::<Day>().unwrap(), Day::Friday);
    }

    #[test]
    fn test_invalid_day_is_validation_error() {
        let err = "SATURDAY".parse::<Day>().unwrap_err();
        assert!(err.is_validation());
        match err {
            mwp_core::MwpError::Validation(errors) => assert!(errors.has_error("day")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_serde_uses_stored_names() {
        assert_eq!(serde_json::to_string(&Week::Week2).unwrap(), "\"WEEK_2\"");
        assert_eq!(serde_json::to_string(&Month::March).unwrap(), "\"MARCH\"");
        let day: Day = serde_json::from_str("\"THURSDAY\"").unwrap();
        assert_eq!(day, Day::Thursday);
        assert!(serde_json::from_str::<Day>("\"SUNDAY\"").is_err());
    }

    #[test]
    fn test_weekday_mapping() {
        assert_eq!(Day::from_weekday(chrono::Weekday::Mon), Some(Day::Monday));
        assert_eq!(Day::from_weekday(chrono::Weekday::Sat), None);
    }
}
