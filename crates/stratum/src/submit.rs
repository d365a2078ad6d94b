use super::*;

#[derive(Debug, PartialEq)]
pub struct Submit {
    pub username: String,
    pub job_id: JobId,
    pub extranonce2: Extranonce,
    pub ntime: Ntime,
    pub nonce: Nonce,
    pub version_bits: Option<Version>,
}

impl Serialize for Submit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.version_bits.is_some() { 6 } else { 5 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.username)?;
        seq.serialize_element(&self.job_id)?;
        seq.serialize_element(&self.extranonce2)?;
        seq.serialize_element(&self.ntime)?;
        seq.serialize_element(&self.nonce)?;
        if let Some(v) = &self.version_bits {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Submit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (username, job_id, extranonce2, ntime, nonce, version_bits) = <(
            String,
            JobId,
            Extranonce,
            Ntime,
            Nonce,
            Option<Version>,
        )>::deserialize(deserializer)?;

        Ok(Submit {
            username,
            job_id,
            extranonce2,
            ntime,
            nonce,
            version_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_roundtrip_without_version_bits() {
        let submit = Submit {
            username: "slush.worker1".into(),
            job_id: "bf".parse().unwrap(),
            extranonce2: "00000001".parse().unwrap(),
            ntime: Ntime::from_str("504e86b9").unwrap(),
            nonce: Nonce::from_str("00000000").unwrap(),
            version_bits: None,
        };

        let json = serde_json::to_string(&submit).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!(["slush.worker1", "bf", "00000001", "504e86b9", "00000000"])
        );

        let back: Submit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, submit);
    }

    #[test]
    fn submit_roundtrip_with_version_bits() {
        let submit = Submit {
            username: "slush.worker1".into(),
            job_id: "bf".parse().unwrap(),
            extranonce2: "00000001".parse().unwrap(),
            ntime: Ntime::from_str("504e86b9").unwrap(),
            nonce: Nonce::from_str("00000000").unwrap(),
            version_bits: Some(Version::from_str("00000000").unwrap()),
        };

        let json = serde_json::to_string(&submit).unwrap();
        let back: Submit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, submit);
    }

    #[test]
    fn submit_rejects_bad_arity() {
        assert!(serde_json::from_str::<Submit>(r#"["a","b","c"]"#).is_err());
    }
}
