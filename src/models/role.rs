use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Platform roles. The permission table below is static configuration, not a
/// policy engine: no conditions, no inheritance, no conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    SchoolAdmin,
    Teacher,
    Parent,
}

/// Capability flags granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Permissions {
    pub view_students: bool,
    pub edit_students: bool,
    pub view_grades: bool,
    pub edit_grades: bool,
    pub view_attendance: bool,
    pub edit_attendance: bool,
    pub view_messages: bool,
    pub send_messages: bool,
    pub manage_school: bool,
    pub manage_users: bool,
    pub view_reports: bool,
    pub export_data: bool,
}

impl Permissions {
    const ALL: Permissions = Permissions {
        view_students: true,
        edit_students: true,
        view_grades: true,
        edit_grades: true,
        view_attendance: true,
        edit_attendance: true,
        view_messages: true,
        send_messages: true,
        manage_school: true,
        manage_users: true,
        view_reports: true,
        export_data: true,
    };

    /// Classroom-operational set: teachers run attendance and grading for
    /// their classes but do not administer the school.
    const TEACHER: Permissions = Permissions {
        view_students: true,
        edit_students: false,
        view_grades: true,
        edit_grades: true,
        view_attendance: true,
        edit_attendance: true,
        view_messages: true,
        send_messages: true,
        manage_school: false,
        manage_users: false,
        view_reports: true,
        export_data: false,
    };

    /// Read/limited-write set: parents follow their own children and can
    /// message the school.
    const PARENT: Permissions = Permissions {
        view_students: true,
        edit_students: false,
        view_grades: true,
        edit_grades: false,
        view_attendance: true,
        edit_attendance: false,
        view_messages: true,
        send_messages: true,
        manage_school: false,
        manage_users: false,
        view_reports: false,
        export_data: false,
    };
}

impl Role {
    pub const fn permissions(self) -> Permissions {
        match self {
            Role::Admin | Role::SchoolAdmin => Permissions::ALL,
            Role::Teacher => Permissions::TEACHER,
            Role::Parent => Permissions::PARENT,
        }
    }
}
