//! JSON-safe encoding for `f64` value buffers.
//!
//! serde_json writes non-finite floats as `null`, and `null` cannot be
//! read back into an `f64`. Value buffers legitimately carry NaN (cells
//! with no finite sample) and ±infinity (zero-baseline anomalies), so
//! buffers are encoded with string tags for the non-finite cases:
//! `"NaN"`, `"inf"`, `"-inf"`. `null` is accepted on read for artifacts
//! written before the tags existed, mapping to NaN.

/// Serde adapter for `Vec<f64>` fields, used via
/// `#[serde(with = "float_buffer")]`.
pub mod float_buffer {
    use serde::de::{Error as DeError, SeqAccess, Unexpected, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for &v in values {
            if v.is_finite() {
                seq.serialize_element(&v)?;
            } else if v.is_nan() {
                seq.serialize_element("NaN")?;
            } else if v > 0.0 {
                seq.serialize_element("inf")?;
            } else {
                seq.serialize_element("-inf")?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        struct BufferVisitor;

        impl<'de> Visitor<'de> for BufferVisitor {
            type Value = Vec<f64>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a sequence of numbers or non-finite tags")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<f64>, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(cell) = seq.next_element::<Cell>()? {
                    out.push(cell.0);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(BufferVisitor)
    }

    struct Cell(f64);

    impl<'de> Deserialize<'de> for Cell {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            struct CellVisitor;

            impl<'de> Visitor<'de> for CellVisitor {
                type Value = Cell;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str("a number, a non-finite tag, or null")
                }

                fn visit_f64<E: DeError>(self, v: f64) -> Result<Cell, E> {
                    Ok(Cell(v))
                }

                fn visit_i64<E: DeError>(self, v: i64) -> Result<Cell, E> {
                    Ok(Cell(v as f64))
                }

                fn visit_u64<E: DeError>(self, v: u64) -> Result<Cell, E> {
                    Ok(Cell(v as f64))
                }

                fn visit_str<E: DeError>(self, s: &str) -> Result<Cell, E> {
                    match s {
                        "NaN" => Ok(Cell(f64::NAN)),
                        "inf" => Ok(Cell(f64::INFINITY)),
                        "-inf" => Ok(Cell(f64::NEG_INFINITY)),
                        other => Err(E::invalid_value(Unexpected::Str(other), &self)),
                    }
                }

                fn visit_unit<E: DeError>(self) -> Result<Cell, E> {
                    Ok(Cell(f64::NAN))
                }

                fn visit_none<E: DeError>(self) -> Result<Cell, E> {
                    Ok(Cell(f64::NAN))
                }
            }

            deserializer.deserialize_any(CellVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Buffer {
        #[serde(with = "super::float_buffer")]
        values: Vec<f64>,
    }

    fn round_trip(values: Vec<f64>) -> Vec<f64> {
        let json = serde_json::to_string(&Buffer { values }).unwrap();
        serde_json::from_str::<Buffer>(&json).unwrap().values
    }

    #[test]
    fn test_non_finite_round_trip() {
        let back = round_trip(vec![1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.25]);
        assert_eq!(back[0], 1.5);
        assert!(back[1].is_nan());
        assert_eq!(back[2], f64::INFINITY);
        assert_eq!(back[3], f64::NEG_INFINITY);
        assert_eq!(back[4], -0.25);
    }

    #[test]
    fn test_tags_in_encoded_form() {
        let json = serde_json::to_string(&Buffer {
            values: vec![f64::NAN, f64::INFINITY],
        })
        .unwrap();
        assert_eq!(json, r#"{"values":["NaN","inf"]}"#);
    }

    #[test]
    fn test_null_reads_as_missing() {
        let back: Buffer = serde_json::from_str(r#"{"values":[2.0,null]}"#).unwrap();
        assert_eq!(back.values[0], 2.0);
        assert!(back.values[1].is_nan());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(serde_json::from_str::<Buffer>(r#"{"values":["huge"]}"#).is_err());
    }
}
