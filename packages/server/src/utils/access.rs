//! Ownership checks shared by the workflow handlers.
//!
//! Three kinds of caller may touch a student's work: the student, the tutor
//! assigned to the program it belongs to, and any admin.

use common::Role;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::{enrollment, material, program};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;

pub async fn find_program<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<program::Model, AppError> {
    program::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Program not found".into()))
}

/// Material plus the program it belongs to.
pub async fn find_material_with_program<C: ConnectionTrait>(
    db: &C,
    material_id: i32,
) -> Result<(material::Model, program::Model), AppError> {
    let material = material::Entity::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".into()))?;
    let program = find_program(db, material.program_id).await?;
    Ok((material, program))
}

/// Admin, or the tutor assigned to `program`.
pub fn manages_program(auth: &AuthUser, program: &program::Model) -> bool {
    auth.is_admin() || (auth.is(Role::Tutor) && program.tutor_id == Some(auth.user_id))
}

pub fn require_program_manager(auth: &AuthUser, program: &program::Model) -> Result<(), AppError> {
    if manages_program(auth, program) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// The student's enrollment in a program, if any.
pub async fn find_enrollment<C: ConnectionTrait>(
    db: &C,
    program_id: i32,
    student_id: i32,
) -> Result<Option<enrollment::Model>, AppError> {
    Ok(enrollment::Entity::find()
        .filter(enrollment::Column::ProgramId.eq(program_id))
        .filter(enrollment::Column::StudentId.eq(student_id))
        .one(db)
        .await?)
}

/// Students need an active or completed enrollment to see program content.
pub async fn require_enrolled<C: ConnectionTrait>(
    db: &C,
    program_id: i32,
    student_id: i32,
) -> Result<enrollment::Model, AppError> {
    match find_enrollment(db, program_id, student_id).await? {
        Some(e) if e.status.grants_access() => Ok(e),
        _ => Err(AppError::Forbidden),
    }
}

/// Program content is readable by its managers and by enrolled students.
pub async fn require_program_reader<C: ConnectionTrait>(
    db: &C,
    auth: &AuthUser,
    program: &program::Model,
) -> Result<(), AppError> {
    if manages_program(auth, program) {
        return Ok(());
    }
    if auth.is(Role::Student) {
        require_enrolled(db, program.id, auth.user_id).await?;
        return Ok(());
    }
    Err(AppError::Forbidden)
}

/// A piece of student work may be read by its owner or by the program's managers.
pub fn require_work_viewer(
    auth: &AuthUser,
    program: &program::Model,
    student_id: i32,
) -> Result<(), AppError> {
    if auth.user_id == student_id || manages_program(auth, program) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
