//! `juso lookup`: check address components against the reference store.

use anyhow::Result;
use serde_json::Value;

use juso_tools::{AddressLookupStore, LookupQuery};

pub fn run(store: &AddressLookupStore, query: &LookupQuery) -> Result<Value> {
    Ok(serde_json::to_value(store.lookup(query))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_known_road() {
        let query = LookupQuery {
            sido: Some("서울특별시".into()),
            sigungu: Some("강남구".into()),
            road_name: Some("자곡로".into()),
            building_number: Some("100".into()),
        };
        let value = run(&AddressLookupStore::embedded(), &query).unwrap();
        assert_eq!(value["building_number"], "100");
        assert!(value["road_name"].is_object());
    }
}
