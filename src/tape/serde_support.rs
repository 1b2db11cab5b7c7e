use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Callbacks, InputEdge, Tape, TapeElement};

impl Serialize for Tape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.has_callbacks() {
            return Err(serde::ser::Error::custom(
                "cannot serialize a Tape containing user callbacks; \
                 recompile from the term instead",
            ));
        }
        let mut s = serializer.serialize_struct("Tape", 3)?;
        s.serialize_field("elements", &self.elements)?;
        s.serialize_field("edges", &self.edges)?;
        s.serialize_field("dimension", &self.dimension)?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Tape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct TapeData {
            elements: Vec<TapeElement>,
            edges: Vec<InputEdge>,
            dimension: u32,
        }

        let data = TapeData::deserialize(deserializer)?;
        if data.elements.iter().any(|e| e.op.is_callback()) {
            return Err(serde::de::Error::custom(
                "tape references callbacks that cannot be restored",
            ));
        }
        let tape = Tape {
            elements: data.elements,
            edges: data.edges,
            dimension: data.dimension,
            callbacks: Callbacks::default(),
            ..Tape::default()
        };
        if !tape.is_well_formed() {
            return Err(serde::de::Error::custom("tape is not well formed"));
        }
        Ok(tape)
    }
}
