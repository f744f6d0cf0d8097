use std::collections::HashMap;

use chrono::{NaiveDate, Timelike};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use booking_cell::models::{Appointment, AppointmentStatus, PaymentStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AnalyticsError, PeakHour, ProviderAnalytics};

#[derive(Deserialize)]
struct RatingRow {
    rating: i32,
}

/// Reduce a provider's appointments and review ratings into the
/// analytics summary. Pure so the arithmetic is testable without wire
/// fixtures.
pub fn compute_analytics(
    provider_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    appointments: &[Appointment],
    ratings: &[i32],
) -> ProviderAnalytics {
    let mut total_revenue = 0.0;
    let mut total_tips = 0.0;
    let mut completed_bookings = 0;
    let mut cancelled_bookings = 0;
    let mut paid_count = 0;
    let mut paid_per_customer: HashMap<Uuid, i32> = HashMap::new();
    let mut hour_counts = [0i32; 24];

    for appointment in appointments {
        if appointment.payment_status == PaymentStatus::Paid {
            total_revenue += appointment.amount;
            total_tips += appointment.tip_amount.unwrap_or(0.0);
            paid_count += 1;
            *paid_per_customer.entry(appointment.customer_id).or_insert(0) += 1;
        }

        match appointment.status {
            AppointmentStatus::Completed => completed_bookings += 1,
            AppointmentStatus::Cancelled => cancelled_bookings += 1,
            _ => {}
        }

        hour_counts[appointment.start_time.hour() as usize] += 1;
    }

    let total_bookings = appointments.len() as i32;

    let average_booking_value = if paid_count > 0 {
        total_revenue / f64::from(paid_count)
    } else {
        0.0
    };

    let returning = paid_per_customer.values().filter(|&&visits| visits > 1).count();
    let retention_rate = if paid_per_customer.is_empty() {
        0.0
    } else {
        returning as f64 / paid_per_customer.len() as f64 * 100.0
    };

    let cancellation_rate = if total_bookings > 0 {
        f64::from(cancelled_bookings) / f64::from(total_bookings) * 100.0
    } else {
        0.0
    };

    let average_rating = if ratings.is_empty() {
        0.0
    } else {
        let sum: i32 = ratings.iter().sum();
        f64::from(sum) / ratings.len() as f64
    };

    // Busiest hours first; ties resolve to the earlier hour
    let mut peak_hours = Vec::new();
    for (hour, &bookings) in hour_counts.iter().enumerate() {
        if bookings > 0 {
            peak_hours.push(PeakHour {
                hour: hour as u32,
                bookings,
            });
        }
    }
    peak_hours.sort_by(|a, b| b.bookings.cmp(&a.bookings).then(a.hour.cmp(&b.hour)));
    peak_hours.truncate(5);

    ProviderAnalytics {
        provider_id,
        from,
        to,
        total_revenue,
        total_tips,
        total_bookings,
        completed_bookings,
        average_booking_value,
        retention_rate,
        cancellation_rate,
        average_rating,
        peak_hours,
    }
}

pub struct AnalyticsService {
    supabase: SupabaseClient,
}

impl AnalyticsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn provider_analytics(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<ProviderAnalytics, AnalyticsError> {
        if from > to {
            return Err(AnalyticsError::ValidationError(
                "`from` must not be after `to`".to_string(),
            ));
        }

        debug!(
            "Computing analytics for provider {} from {} to {}",
            provider_id, from, to
        );

        let appointments = self
            .fetch_appointments(provider_id, from, to, auth_token)
            .await?;
        let ratings = self.fetch_ratings(provider_id, from, to, auth_token).await?;

        Ok(compute_analytics(
            provider_id,
            from,
            to,
            &appointments,
            &ratings,
        ))
    }

    async fn fetch_appointments(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AnalyticsError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc",
            provider_id, from, to
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AnalyticsError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AnalyticsError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })
    }

    async fn fetch_ratings(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<i32>, AnalyticsError> {
        // created_at is a timestamp; take everything before the day after `to`
        let end = to.succ_opt().unwrap_or(to);
        let path = format!(
            "/rest/v1/reviews?provider_id=eq.{}&created_at=gte.{}&created_at=lt.{}&select=rating",
            provider_id, from, end
        );

        let rows: Vec<RatingRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AnalyticsError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.rating).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use provider_cell::models::CancellationPolicy;

    fn appointment(
        customer_id: Uuid,
        hour: u32,
        status: AppointmentStatus,
        payment_status: PaymentStatus,
        amount: f64,
        tip_amount: Option<f64>,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            customer_id,
            provider_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            staff_id: None,
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt((hour + 1) % 24, 0, 0).unwrap(),
            status,
            payment_status,
            amount,
            tip_amount,
            deposit_required: false,
            deposit_amount: None,
            deposit_paid: false,
            cancellation_policy: CancellationPolicy::Moderate,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn window() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_empty_window_reads_as_zeroes() {
        let (from, to) = window();
        let analytics = compute_analytics(Uuid::new_v4(), from, to, &[], &[]);

        assert_eq!(analytics.total_revenue, 0.0);
        assert_eq!(analytics.total_tips, 0.0);
        assert_eq!(analytics.total_bookings, 0);
        assert_eq!(analytics.completed_bookings, 0);
        assert_eq!(analytics.average_booking_value, 0.0);
        assert_eq!(analytics.retention_rate, 0.0);
        assert_eq!(analytics.cancellation_rate, 0.0);
        assert_eq!(analytics.average_rating, 0.0);
        assert!(analytics.peak_hours.is_empty());
    }

    #[test]
    fn test_revenue_covers_paid_bookings_only() {
        let (from, to) = window();
        let customer = Uuid::new_v4();
        let appointments = vec![
            appointment(customer, 10, AppointmentStatus::Completed, PaymentStatus::Paid, 100.0, None),
            appointment(customer, 11, AppointmentStatus::Completed, PaymentStatus::Paid, 200.0, Some(20.0)),
            appointment(customer, 12, AppointmentStatus::Completed, PaymentStatus::Paid, 300.0, None),
            appointment(customer, 13, AppointmentStatus::Scheduled, PaymentStatus::Pending, 500.0, None),
        ];

        let analytics = compute_analytics(Uuid::new_v4(), from, to, &appointments, &[]);

        assert_eq!(analytics.total_revenue, 600.0);
        assert_eq!(analytics.total_tips, 20.0);
        assert_eq!(analytics.average_booking_value, 200.0);
        assert_eq!(analytics.total_bookings, 4);
        assert_eq!(analytics.completed_bookings, 3);
    }

    #[test]
    fn test_retention_counts_repeat_paid_customers() {
        let (from, to) = window();
        let regular = Uuid::new_v4();
        let one_off = Uuid::new_v4();
        let appointments = vec![
            appointment(regular, 10, AppointmentStatus::Completed, PaymentStatus::Paid, 80.0, None),
            appointment(regular, 11, AppointmentStatus::Completed, PaymentStatus::Paid, 80.0, None),
            appointment(one_off, 12, AppointmentStatus::Completed, PaymentStatus::Paid, 80.0, None),
        ];

        let analytics = compute_analytics(Uuid::new_v4(), from, to, &appointments, &[]);

        // One of two paying customers came back
        assert_eq!(analytics.retention_rate, 50.0);
    }

    #[test]
    fn test_cancellation_rate() {
        let (from, to) = window();
        let customer = Uuid::new_v4();
        let appointments = vec![
            appointment(customer, 10, AppointmentStatus::Cancelled, PaymentStatus::Pending, 60.0, None),
            appointment(customer, 11, AppointmentStatus::Completed, PaymentStatus::Paid, 60.0, None),
            appointment(customer, 12, AppointmentStatus::Completed, PaymentStatus::Paid, 60.0, None),
            appointment(customer, 13, AppointmentStatus::NoShow, PaymentStatus::Pending, 60.0, None),
        ];

        let analytics = compute_analytics(Uuid::new_v4(), from, to, &appointments, &[]);

        assert_eq!(analytics.cancellation_rate, 25.0);
    }

    #[test]
    fn test_average_rating_over_window_reviews() {
        let (from, to) = window();
        let analytics = compute_analytics(Uuid::new_v4(), from, to, &[], &[5, 4, 3]);

        assert_eq!(analytics.average_rating, 4.0);
        assert!(analytics.average_rating >= 0.0 && analytics.average_rating <= 5.0);
    }

    #[test]
    fn test_peak_hours_ranked_and_capped_at_five() {
        let (from, to) = window();
        let customer = Uuid::new_v4();
        let mut appointments = Vec::new();
        // Three at 10:00, two at 14:00, one each at 9, 11, 12, 13
        for _ in 0..3 {
            appointments.push(appointment(customer, 10, AppointmentStatus::Completed, PaymentStatus::Paid, 50.0, None));
        }
        for _ in 0..2 {
            appointments.push(appointment(customer, 14, AppointmentStatus::Completed, PaymentStatus::Paid, 50.0, None));
        }
        for hour in [9, 11, 12, 13] {
            appointments.push(appointment(customer, hour, AppointmentStatus::Scheduled, PaymentStatus::Pending, 50.0, None));
        }

        let analytics = compute_analytics(Uuid::new_v4(), from, to, &appointments, &[]);

        assert_eq!(analytics.peak_hours.len(), 5);
        assert_eq!(analytics.peak_hours[0], PeakHour { hour: 10, bookings: 3 });
        assert_eq!(analytics.peak_hours[1], PeakHour { hour: 14, bookings: 2 });
        // Remaining single-booking hours rank earliest first
        assert_eq!(analytics.peak_hours[2], PeakHour { hour: 9, bookings: 1 });
        assert_eq!(analytics.peak_hours[3], PeakHour { hour: 11, bookings: 1 });
        assert_eq!(analytics.peak_hours[4], PeakHour { hour: 12, bookings: 1 });
    }
}
