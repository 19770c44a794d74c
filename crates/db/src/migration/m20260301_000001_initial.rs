//! Initial database migration.
//!
//! Creates the tenant, seat, student and payment tables. Seats and students
//! reference each other, so their foreign keys are added once both exist.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TENANTS
        // ============================================================
        db.execute_unprepared(LIBRARIES_SQL).await?;
        db.execute_unprepared(MANAGERS_SQL).await?;

        // ============================================================
        // PART 2: CATALOG AND OCCUPANCY
        // ============================================================
        db.execute_unprepared(PAYMENT_PLANS_SQL).await?;
        db.execute_unprepared(SEATS_SQL).await?;
        db.execute_unprepared(STUDENTS_SQL).await?;
        db.execute_unprepared(OCCUPANCY_LINKS_SQL).await?;

        // ============================================================
        // PART 3: LEDGER
        // ============================================================
        db.execute_unprepared(PAYMENTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const LIBRARIES_SQL: &str = r"
CREATE TABLE libraries (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_library_name CHECK (length(trim(name)) > 0)
);
";

const MANAGERS_SQL: &str = r"
CREATE TABLE managers (
    id UUID PRIMARY KEY,
    full_name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    library_id UUID REFERENCES libraries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Emails are unique regardless of case
CREATE UNIQUE INDEX uq_managers_email ON managers(lower(email));

CREATE INDEX idx_managers_library ON managers(library_id) WHERE library_id IS NOT NULL;
";

const PAYMENT_PLANS_SQL: &str = r"
CREATE TABLE payment_plans (
    id UUID PRIMARY KEY,
    library_id UUID NOT NULL REFERENCES libraries(id),
    name VARCHAR(255) NOT NULL,
    amount NUMERIC(12, 2) NOT NULL,
    frequency VARCHAR(16) NOT NULL,
    CONSTRAINT chk_plan_amount CHECK (amount >= 0),
    CONSTRAINT chk_plan_frequency CHECK (frequency IN ('monthly', 'quarterly', 'annually'))
);

CREATE INDEX idx_payment_plans_library ON payment_plans(library_id);
";

const SEATS_SQL: &str = r"
CREATE TABLE seats (
    id UUID PRIMARY KEY,
    library_id UUID NOT NULL REFERENCES libraries(id),
    seat_number VARCHAR(32) NOT NULL,
    floor VARCHAR(64) NOT NULL DEFAULT '',
    occupant_student_id UUID,
    version BIGINT NOT NULL DEFAULT 0,
    CONSTRAINT uq_seats_number UNIQUE (library_id, seat_number),
    CONSTRAINT chk_seat_version CHECK (version >= 0)
);
";

const STUDENTS_SQL: &str = r"
CREATE TABLE students (
    id UUID PRIMARY KEY,
    library_id UUID NOT NULL REFERENCES libraries(id),
    full_name VARCHAR(255) NOT NULL,
    email VARCHAR(255),
    phone VARCHAR(32),
    fees_due NUMERIC(12, 2) NOT NULL DEFAULT 0,
    deactivated BOOLEAN NOT NULL DEFAULT false,
    seat_id UUID,
    payment_plan_id UUID REFERENCES payment_plans(id),
    last_payment_date DATE,
    enrollment_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_students_library ON students(library_id, created_at);
";

const OCCUPANCY_LINKS_SQL: &str = r"
-- One seat per student and one student per seat. Deferred so a transaction
-- can move pointers around before the check runs at commit.
ALTER TABLE seats
    ADD CONSTRAINT fk_seats_occupant FOREIGN KEY (occupant_student_id) REFERENCES students(id),
    ADD CONSTRAINT uq_seats_occupant UNIQUE (occupant_student_id) DEFERRABLE INITIALLY DEFERRED;

ALTER TABLE students
    ADD CONSTRAINT fk_students_seat FOREIGN KEY (seat_id) REFERENCES seats(id),
    ADD CONSTRAINT uq_students_seat UNIQUE (seat_id) DEFERRABLE INITIALLY DEFERRED;
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    library_id UUID NOT NULL REFERENCES libraries(id),
    student_id UUID NOT NULL REFERENCES students(id),
    amount NUMERIC(12, 2) NOT NULL,
    payment_date DATE NOT NULL,
    notes TEXT,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_amount CHECK (amount > 0)
);

CREATE INDEX idx_payments_student ON payments(student_id, recorded_at);
CREATE INDEX idx_payments_library_date ON payments(library_id, payment_date);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS payments CASCADE;
ALTER TABLE IF EXISTS students DROP CONSTRAINT IF EXISTS fk_students_seat;
ALTER TABLE IF EXISTS seats DROP CONSTRAINT IF EXISTS fk_seats_occupant;
DROP TABLE IF EXISTS students CASCADE;
DROP TABLE IF EXISTS seats CASCADE;
DROP TABLE IF EXISTS payment_plans CASCADE;
DROP TABLE IF EXISTS managers CASCADE;
DROP TABLE IF EXISTS libraries CASCADE;
";
