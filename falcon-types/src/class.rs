use serde::{Deserialize, Serialize};

/// The closed set of object classes FALCON reasons about.
///
/// `WorkPerson`/`WorkVehicle` are never produced by the detector directly;
/// they are the output of the subclass refiner (component 4.7) upgrading a
/// `Person`/`Vehicle` detection once its HSV signature matches a hi-vis
/// vest or a work-vehicle livery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassTag {
    #[serde(rename = "BIRD")]
    Bird,
    #[serde(rename = "FOD")]
    Fod,
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "ANIMAL")]
    Animal,
    #[serde(rename = "AIRPLANE")]
    Airplane,
    #[serde(rename = "VEHICLE")]
    Vehicle,
    #[serde(rename = "WORK_PERSON")]
    WorkPerson,
    #[serde(rename = "WORK_VEHICLE")]
    WorkVehicle,
}

impl ClassTag {
    /// Classes eligible for subclass refinement (4.7).
    pub fn is_refinable(self) -> bool {
        matches!(self, ClassTag::Person | ClassTag::Vehicle)
    }

    pub fn refine_to_worker(self) -> Option<ClassTag> {
        match self {
            ClassTag::Person => Some(ClassTag::WorkPerson),
            ClassTag::Vehicle => Some(ClassTag::WorkVehicle),
            _ => None,
        }
    }

    /// Classes the rescue-level estimator (4.8) ever runs pose inference for.
    pub fn is_pose_eligible(self) -> bool {
        matches!(self, ClassTag::Person | ClassTag::WorkPerson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_upper_snake_case() {
        assert_eq!(serde_json::to_string(&ClassTag::WorkPerson).unwrap(), "\"WORK_PERSON\"");
        assert_eq!(serde_json::to_string(&ClassTag::Fod).unwrap(), "\"FOD\"");
    }

    #[test]
    fn only_person_and_vehicle_refine() {
        assert!(ClassTag::Person.is_refinable());
        assert!(ClassTag::Vehicle.is_refinable());
        assert!(!ClassTag::Bird.is_refinable());
        assert_eq!(ClassTag::Person.refine_to_worker(), Some(ClassTag::WorkPerson));
        assert_eq!(ClassTag::Bird.refine_to_worker(), None);
    }
}
